//! Property merging.
//!
//! Every routine takes an aligned slice of inputs, one slot per input
//! archive in stitch order. `None` marks an input that lacks the property.

use half::f16;

use super::context::{join_path, StitchContext};
use super::error::StitchError;
use super::geom_param::stitch_arb_geom_param;
use super::index::get_index_sample;
use super::report::SkipReason;
use crate::abc::{
    ArrayData, CompoundData, IArrayProperty, ICompoundProperty, IProperty, IScalarProperty,
    PropertyData, ScalarData,
};
use crate::core::{ArraySample, PropertyHeader, PropertyType, SampleData};
use crate::util::{AlembicPod, Bool, DataType, Error, PlainOldDataType};

/// Merge every property found under `inputs` into `out`.
///
/// Names are visited in first-seen order across inputs. Names already in
/// `out` are left alone.
pub fn stitch_compound_prop(
    ctx: &mut StitchContext<'_>,
    inputs: &[Option<ICompoundProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
) -> Result<(), StitchError> {
    let mut names: Vec<&str> = Vec::new();
    for compound in inputs.iter().flatten() {
        for header in compound.property_headers() {
            if !names.contains(&header.name.as_str()) {
                names.push(&header.name);
            }
        }
    }

    for name in names {
        if out.contains(name) {
            continue;
        }
        let props: Vec<Option<IProperty<'_>>> = inputs
            .iter()
            .map(|c| c.and_then(|c| c.property(name)))
            .collect();
        stitch_property(ctx, &props, out, path)?;
    }
    Ok(())
}

/// Merge one named property. The first present input decides its kind.
pub fn stitch_property(
    ctx: &mut StitchContext<'_>,
    props: &[Option<IProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
) -> Result<(), StitchError> {
    let Some(first) = props.iter().flatten().next() else {
        return Ok(());
    };
    let header = first.header();

    if header.meta_data.is_geom_param() && stitch_arb_geom_param(ctx, props, out, path)? {
        return Ok(());
    }

    let prop_path = join_path(path, &header.name);
    match header.property_type {
        PropertyType::Compound => {
            let children = select(ctx, props, PropertyType::Compound, &prop_path, |p| p.as_compound())?;
            let child = out.add_compound(
                PropertyHeader::compound(header.name.clone()).with_meta_data(header.meta_data.clone()),
            );
            stitch_compound_prop(ctx, &children, child, &prop_path)
        }
        PropertyType::Scalar => {
            let scalars = select(ctx, props, PropertyType::Scalar, &prop_path, |p| p.as_scalar())?;
            stitch_scalar_prop(ctx, &scalars, out, path)
        }
        PropertyType::Array => {
            let arrays = select(ctx, props, PropertyType::Array, &prop_path, |p| p.as_array())?;
            stitch_array_prop(ctx, &arrays, out, path)
        }
    }
}

/// Narrow `props` to one kind. Inputs of another kind are reported and
/// left out.
fn select<'a, T>(
    ctx: &mut StitchContext<'_>,
    props: &[Option<IProperty<'a>>],
    expected: PropertyType,
    path: &str,
    narrow: impl Fn(&IProperty<'a>) -> Option<T>,
) -> Result<Vec<Option<T>>, StitchError> {
    let mut out = Vec::with_capacity(props.len());
    for (i, prop) in props.iter().enumerate() {
        let narrowed = prop.as_ref().and_then(&narrow);
        if let (Some(prop), None) = (prop, &narrowed) {
            ctx.skip(
                path,
                i,
                SkipReason::PropertyTypeMismatch {
                    expected,
                    actual: prop.property_type(),
                },
            )?;
        }
        out.push(narrowed);
    }
    Ok(out)
}

/// Merge a scalar property into `out`.
///
/// Gaps and the tail are filled with zero-valued samples (empty strings
/// for string PODs) up to the expected count of the canonical track.
pub fn stitch_scalar_prop(
    ctx: &mut StitchContext<'_>,
    inputs: &[Option<IScalarProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
) -> Result<(), StitchError> {
    let Some((first_input, first)) = inputs
        .iter()
        .enumerate()
        .find_map(|(i, p)| p.map(|p| (i, p)))
    else {
        return Ok(());
    };
    let header = first.header();
    let prop_path = join_path(path, &header.name);
    let data_type = header.data_type;

    if data_type.pod == PlainOldDataType::Unknown {
        return ctx.skip(&prop_path, first_input, SkipReason::UnsupportedPod(data_type.pod));
    }

    let track = ctx.track(first.time_sampling());
    let mut data = ScalarData::new(
        PropertyHeader::scalar(header.name.clone(), data_type)
            .with_time_sampling(track.index)
            .with_meta_data(header.meta_data.clone()),
    );

    for (i, input) in inputs.iter().enumerate() {
        let Some(input) = input else { continue };
        if input.data_type() != data_type {
            ctx.skip(
                &prop_path,
                i,
                SkipReason::DataTypeMismatch {
                    expected: data_type,
                    actual: input.data_type(),
                },
            )?;
            continue;
        }

        let n = input.num_samples();
        let align = get_index_sample(data.num_samples(), &track.sampling, n, input.time_sampling());
        for _ in 0..align.num_empty {
            data.push(SampleData::zeroed(data_type));
        }
        for s in align.start..n {
            let sample = input.sample(s)?;
            let copied = copy_scalar_sample(&sample, data_type).ok_or_else(|| {
                Error::invalid(format!("{}: sample {} is not a {}", prop_path, s, data_type))
            })?;
            data.push(copied);
        }
    }

    while data.num_samples() < track.expected {
        data.push(SampleData::zeroed(data_type));
    }

    tracing::trace!("{}: {} scalar samples", prop_path, data.num_samples());
    out.add(PropertyData::Scalar(data));
    ctx.report.record_property();
    Ok(())
}

/// Merge an array property into `out`.
///
/// Gaps and the tail are filled with zero-length samples.
pub fn stitch_array_prop(
    ctx: &mut StitchContext<'_>,
    inputs: &[Option<IArrayProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
) -> Result<(), StitchError> {
    let Some((first_input, first)) = inputs
        .iter()
        .enumerate()
        .find_map(|(i, p)| p.map(|p| (i, p)))
    else {
        return Ok(());
    };
    let header = first.header();
    let prop_path = join_path(path, &header.name);
    let data_type = header.data_type;

    if data_type.pod == PlainOldDataType::Unknown {
        return ctx.skip(&prop_path, first_input, SkipReason::UnsupportedPod(data_type.pod));
    }

    let track = ctx.track(first.time_sampling());
    let mut data = ArrayData::new(
        PropertyHeader::array(header.name.clone(), data_type)
            .with_time_sampling(track.index)
            .with_meta_data(header.meta_data.clone()),
    );

    for (i, input) in inputs.iter().enumerate() {
        let Some(input) = input else { continue };
        if input.data_type() != data_type {
            ctx.skip(
                &prop_path,
                i,
                SkipReason::DataTypeMismatch {
                    expected: data_type,
                    actual: input.data_type(),
                },
            )?;
            continue;
        }

        let n = input.num_samples();
        let align = get_index_sample(data.num_samples(), &track.sampling, n, input.time_sampling());
        for _ in 0..align.num_empty {
            data.push(ArraySample::empty(data_type.pod));
        }
        for s in align.start..n {
            data.push(input.sample(s)?);
        }
    }

    while data.num_samples() < track.expected {
        data.push(ArraySample::empty(data_type.pod));
    }

    tracing::trace!("{}: {} array samples", prop_path, data.num_samples());
    out.add(PropertyData::Array(data));
    ctx.report.record_property();
    Ok(())
}

/// Copy one scalar sample through its typed representation. `None` when
/// the payload does not hold exactly one `data_type` element.
pub(crate) fn copy_scalar_sample(sample: &SampleData, data_type: DataType) -> Option<SampleData> {
    fn typed<T: AlembicPod>(sample: &SampleData, extent: usize) -> Option<SampleData> {
        let values = sample.values::<T>()?;
        (values.len() == extent).then(|| SampleData::from_values(&values))
    }

    let extent = data_type.extent as usize;
    match data_type.pod {
        PlainOldDataType::Boolean => typed::<Bool>(sample, extent),
        PlainOldDataType::Uint8 => typed::<u8>(sample, extent),
        PlainOldDataType::Int8 => typed::<i8>(sample, extent),
        PlainOldDataType::Uint16 => typed::<u16>(sample, extent),
        PlainOldDataType::Int16 => typed::<i16>(sample, extent),
        PlainOldDataType::Uint32 => typed::<u32>(sample, extent),
        PlainOldDataType::Int32 => typed::<i32>(sample, extent),
        PlainOldDataType::Uint64 => typed::<u64>(sample, extent),
        PlainOldDataType::Int64 => typed::<i64>(sample, extent),
        PlainOldDataType::Float16 => typed::<f16>(sample, extent),
        PlainOldDataType::Float32 => typed::<f32>(sample, extent),
        PlainOldDataType::Float64 => typed::<f64>(sample, extent),
        PlainOldDataType::String | PlainOldDataType::Wstring => sample
            .strings()
            .filter(|s| s.len() == extent)
            .map(|s| SampleData::Strings(s.to_vec())),
        PlainOldDataType::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{ArchiveData, IArchive, TimeSamplingTable};
    use crate::core::{MetaData, TimeSampling};
    use crate::stitch::{StitchOptions, StitchReport, TimeAndSamplesMap};

    /// Archive with a root-level float scalar `s` holding `values` on a
    /// uniform 1.0 track starting at `start`.
    fn scalar_archive(start: f64, values: &[f32], data_type: DataType) -> IArchive {
        let mut data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY, TimeSampling::uniform(1.0, start)],
            ..Default::default()
        };
        let s = data
            .root
            .properties
            .add_scalar(PropertyHeader::scalar("s", data_type).with_time_sampling(1));
        for v in values {
            s.push(SampleData::from_values(&[*v]));
        }
        data.update_max_samples();
        IArchive::from_data("mem", data).unwrap()
    }

    fn registry_for(archives: &[&IArchive]) -> TimeAndSamplesMap {
        let mut registry = TimeAndSamplesMap::new();
        for a in archives {
            for (i, ts) in a.time_samplings().iter().enumerate() {
                registry.add(ts, a.max_num_samples_for_time_sampling(i).unwrap_or(0));
            }
        }
        registry
    }

    fn stitch_roots(archives: &[&IArchive]) -> (CompoundData, StitchReport) {
        let registry = registry_for(archives);
        let mut samplings = TimeSamplingTable::new();
        let options = StitchOptions::default();
        let mut report = StitchReport::new(archives.len());
        let mut out = CompoundData::new(PropertyHeader::compound(""));
        {
            let mut ctx = StitchContext::new(&registry, &mut samplings, &options, &mut report);
            let inputs: Vec<_> = archives.iter().map(|a| Some(a.root().properties())).collect();
            stitch_compound_prop(&mut ctx, &inputs, &mut out, "/").unwrap();
        }
        (out, report)
    }

    fn floats(prop: &PropertyData) -> Vec<f32> {
        match prop {
            PropertyData::Scalar(s) => s.samples.iter().flat_map(|s| s.values::<f32>().unwrap()).collect(),
            _ => panic!("not a scalar"),
        }
    }

    #[test]
    fn test_gap_fill_between_inputs() {
        let a = scalar_archive(0.0, &[1.0], DataType::FLOAT32);
        let b = scalar_archive(2.0, &[3.0, 4.0], DataType::FLOAT32);
        let (out, report) = stitch_roots(&[&a, &b]);

        let s = out.get("s").unwrap();
        assert_eq!(floats(s), vec![1.0, 0.0, 3.0, 4.0]);
        assert_eq!(report.properties, 1);
    }

    #[test]
    fn test_overlap_not_duplicated() {
        let a = scalar_archive(0.0, &[1.0, 2.0, 3.0], DataType::FLOAT32);
        let (out, _) = stitch_roots(&[&a, &a]);
        assert_eq!(floats(out.get("s").unwrap()), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mismatched_type_is_skipped() {
        let a = scalar_archive(0.0, &[1.0, 2.0], DataType::FLOAT32);
        let mut data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY, TimeSampling::uniform(1.0, 2.0)],
            ..Default::default()
        };
        let s = data
            .root
            .properties
            .add_scalar(PropertyHeader::scalar("s", DataType::INT32).with_time_sampling(1));
        s.push(SampleData::from_values(&[7i32]));
        s.push(SampleData::from_values(&[8i32]));
        data.update_max_samples();
        let b = IArchive::from_data("mem", data).unwrap();

        let (out, report) = stitch_roots(&[&a, &b]);
        assert_eq!(floats(out.get("s").unwrap()), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(report.skipped().len(), 1);
        assert_eq!(report.skipped()[0].input, 1);
        assert_eq!(report.skipped()[0].path, "/s");
    }

    #[test]
    fn test_unsupported_pod_not_created() {
        let mut data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY],
            ..Default::default()
        };
        data.root
            .properties
            .add_scalar(PropertyHeader::scalar("odd", DataType::UNKNOWN))
            .push(SampleData::Pod(Vec::new()));
        let a = IArchive::from_data("mem", data).unwrap();
        let (out, report) = stitch_roots(&[&a, &a]);
        assert!(!out.contains("odd"));
        assert!(matches!(
            report.skipped()[0].reason,
            SkipReason::UnsupportedPod(PlainOldDataType::Unknown)
        ));
    }

    #[test]
    fn test_nested_compound_and_strings() {
        let mut data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY],
            ..Default::default()
        };
        let user = data.root.properties.add_compound(
            PropertyHeader::compound(".userProperties").with_meta_data(MetaData::new().with("k", "v")),
        );
        user.add_scalar(PropertyHeader::scalar("label", DataType::STRING))
            .push(SampleData::from_strings(["hero"]));
        user.add_array(PropertyHeader::array("ids", DataType::INT32))
            .push(ArraySample::from_values(&[1i32, 2, 3], 1));
        data.update_max_samples();
        let a = IArchive::from_data("mem", data).unwrap();

        let (mut out, _) = stitch_roots(&[&a, &a]);
        let user = out.compound_mut(".userProperties").unwrap();
        assert_eq!(user.header.meta_data.get("k"), Some("v"));
        match user.get("label") {
            Some(PropertyData::Scalar(s)) => {
                assert_eq!(s.samples, vec![SampleData::from_strings(["hero"])]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(user.get("ids").map(|p| p.num_samples()), Some(1));
    }

    #[test]
    fn test_copy_scalar_sample_checks_extent() {
        let v = SampleData::from_values(&[1.0f32, 2.0, 3.0]);
        assert_eq!(copy_scalar_sample(&v, DataType::VEC3F), Some(v.clone()));
        assert_eq!(copy_scalar_sample(&v, DataType::FLOAT32), None);
        let b = SampleData::from_values(&[Bool::TRUE]);
        assert_eq!(copy_scalar_sample(&b, DataType::BOOL), Some(b.clone()));
    }
}
