//! Geometry parameters stored expanded by some inputs and indexed by others.
//!
//! An indexed parameter is a compound holding `.vals` and `.indices`; an
//! expanded one is a plain array. When inputs disagree the output is
//! indexed, with identity indices written for expanded samples.

use super::context::{join_path, StitchContext};
use super::error::StitchError;
use super::index::get_index_sample;
use super::report::SkipReason;
use crate::abc::{ArrayData, CompoundData, IArrayProperty, IProperty, PropertyData};
use crate::core::{ArraySample, MetaData, PropertyHeader, PropertyType};
use crate::util::{DataType, PlainOldDataType};

pub const VALS_NAME: &str = ".vals";
pub const INDICES_NAME: &str = ".indices";

/// One input's view of a geometry parameter.
#[derive(Clone, Copy)]
struct ParamInput<'a> {
    vals: IArrayProperty<'a>,
    indices: Option<IArrayProperty<'a>>,
}

impl<'a> ParamInput<'a> {
    fn resolve(prop: &IProperty<'a>) -> Option<Self> {
        match prop {
            IProperty::Array(vals) => Some(Self { vals: *vals, indices: None }),
            IProperty::Compound(c) => Some(Self {
                vals: c.array(VALS_NAME)?,
                indices: c.array(INDICES_NAME),
            }),
            IProperty::Scalar(_) => None,
        }
    }
}

/// Identity index sample `[0, 1, .., n-1]`.
pub fn identity_indices(n: usize) -> ArraySample {
    let indices: Vec<u32> = (0..n as u32).collect();
    ArraySample::from_values(&indices, 1)
}

/// Merge a geometry parameter whose inputs disagree on representation.
///
/// Returns `false` without touching `out` when every present input uses the
/// same property kind, so the generic path applies.
pub fn stitch_arb_geom_param(
    ctx: &mut StitchContext<'_>,
    props: &[Option<IProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
) -> Result<bool, StitchError> {
    let mut kinds = props.iter().flatten().map(|p| p.property_type());
    let Some(first_kind) = kinds.next() else {
        return Ok(false);
    };
    if kinds.all(|k| k == first_kind) {
        return Ok(false);
    }

    let mut params = Vec::with_capacity(props.len());
    let mut canonical: Option<(&IProperty<'_>, ParamInput<'_>)> = None;
    for (i, prop) in props.iter().enumerate() {
        let Some(prop) = prop else {
            params.push(None);
            continue;
        };
        let param = ParamInput::resolve(prop);
        if param.is_none() {
            ctx.skip(
                &join_path(path, prop.name()),
                i,
                SkipReason::PropertyTypeMismatch {
                    expected: PropertyType::Array,
                    actual: prop.property_type(),
                },
            )?;
        }
        if let (None, Some(param)) = (&canonical, param) {
            canonical = Some((prop, param));
        }
        params.push(param);
    }

    let Some((header_prop, first)) = canonical else {
        return Ok(false);
    };
    let name = header_prop.name().to_string();
    let prop_path = join_path(path, &name);
    let data_type = first.vals.data_type();

    let mut param_meta = header_prop.header().meta_data.clone();
    let vals_meta = match header_prop.property_type() {
        PropertyType::Compound => first.vals.header().meta_data.clone(),
        _ => {
            let mut meta = param_meta.clone();
            meta.remove(MetaData::GEOM_PARAM_KEY);
            meta
        }
    };
    param_meta.set(MetaData::GEOM_PARAM_KEY, "true");

    let track = ctx.track(first.vals.time_sampling());
    let mut vals = ArrayData::new(
        PropertyHeader::array(VALS_NAME, data_type)
            .with_time_sampling(track.index)
            .with_meta_data(vals_meta),
    );
    let mut indices = ArrayData::new(
        PropertyHeader::array(INDICES_NAME, DataType::UINT32).with_time_sampling(track.index),
    );

    for (i, param) in params.iter().enumerate() {
        let Some(param) = param else { continue };
        if param.vals.data_type() != data_type {
            ctx.skip(
                &prop_path,
                i,
                SkipReason::DataTypeMismatch {
                    expected: data_type,
                    actual: param.vals.data_type(),
                },
            )?;
            continue;
        }

        let n = param.vals.num_samples();
        let align = get_index_sample(vals.num_samples(), &track.sampling, n, param.vals.time_sampling());
        for _ in 0..align.num_empty {
            vals.push(ArraySample::empty(data_type.pod));
            indices.push(ArraySample::empty(PlainOldDataType::Uint32));
        }
        for s in align.start..n {
            let sample = param.vals.sample(s)?;
            let index_sample = match &param.indices {
                Some(ind) => ind.sample(s)?,
                None => identity_indices(sample.len()),
            };
            vals.push(sample);
            indices.push(index_sample);
        }
    }

    while vals.num_samples() < track.expected {
        vals.push(ArraySample::empty(data_type.pod));
        indices.push(ArraySample::empty(PlainOldDataType::Uint32));
    }

    tracing::trace!("{}: reconciled to indexed, {} samples", prop_path, vals.num_samples());
    let compound = out.add_compound(PropertyHeader::compound(name).with_meta_data(param_meta));
    compound.add(PropertyData::Array(vals));
    compound.add(PropertyData::Array(indices));
    ctx.report.record_property();
    Ok(true)
}
