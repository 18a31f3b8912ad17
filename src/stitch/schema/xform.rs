//! Transform schema.
//!
//! Gaps repeat the input's first copied sample and the tail repeats the
//! last written one. Every input must share one operation layout.

use super::{BoundInput, FieldSpec, ISchema, OSchema, SchemaHandler, SchemaKind};
use crate::abc::IProperty;
use crate::stitch::error::StitchError;
use crate::stitch::index::SampleAlignment;
use crate::util::{DataType, Result};

pub const XFORM_SCHEMA_PREFIX: &str = "AbcGeom_Xform_v";
pub const OPS_NAME: &str = ".ops";

pub static XFORM_FIELDS: [FieldSpec; 5] = [
    FieldSpec::scalar(".inherits", DataType::BOOL),
    FieldSpec::either(".vals", DataType::FLOAT64),
    FieldSpec::scalar(OPS_NAME, DataType::UINT8).constant(),
    FieldSpec::scalar(".isNotConstantIdentity", DataType::BOOL).constant(),
    FieldSpec::array(".animChans", DataType::UINT32).constant(),
];

pub struct XformHandler;

impl SchemaHandler for XformHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Xform
    }

    fn schema_prefix(&self) -> &'static str {
        XFORM_SCHEMA_PREFIX
    }

    fn default_compound(&self) -> &'static str {
        ".xform"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &XFORM_FIELDS
    }

    fn gap_fill(&self, out: &mut OSchema, input: &BoundInput<'_>, align: SampleAlignment) -> Result<()> {
        if align.start >= input.num_samples {
            return Ok(());
        }
        for _ in 0..align.num_empty {
            out.set_from_input(input, align.start)?;
        }
        Ok(())
    }

    fn tail_pad(&self, out: &mut OSchema, expected: usize) {
        if out.num_samples() == 0 {
            return;
        }
        while out.num_samples() < expected {
            out.set_from_previous();
        }
    }

    fn validate(&self, path: &str, inputs: &[Option<ISchema<'_>>]) -> Result<(), StitchError> {
        let mut first: Option<Vec<u8>> = None;
        for (i, schema) in inputs.iter().enumerate() {
            let Some(schema) = schema else { continue };
            let Some(ops) = ops_layout(schema)? else { continue };
            match &first {
                None => first = Some(ops),
                Some(f) if *f != ops => {
                    return Err(StitchError::XformOpsMismatch {
                        path: path.to_string(),
                        input: i,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Encoded operation layout of an input, `None` when it has no ops.
fn ops_layout(schema: &ISchema<'_>) -> Result<Option<Vec<u8>>> {
    let bytes = match schema.compound.property(OPS_NAME) {
        Some(IProperty::Scalar(p)) if p.num_samples() > 0 => p.sample(0)?.bytes().map(<[u8]>::to_vec),
        Some(IProperty::Array(p)) if p.num_samples() > 0 => p.sample(0)?.data.bytes().map(<[u8]>::to_vec),
        _ => None,
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::{ArchiveData, CompoundData, IArchive, PropertyData, TimeSamplingTable};
    use crate::core::{ArraySample, MetaData, PropertyHeader, SampleData, TimeSampling};
    use crate::stitch::context::StitchContext;
    use crate::stitch::{StitchOptions, StitchReport, TimeAndSamplesMap};

    fn xform(ops: &[u8]) -> IArchive {
        let mut data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY],
            ..Default::default()
        };
        let obj = data
            .root
            .add_child("xf", MetaData::new().with(MetaData::SCHEMA_KEY, "AbcGeom_Xform_v3"));
        let compound = obj.properties.add_compound(PropertyHeader::compound(".xform"));
        compound
            .add_scalar(PropertyHeader::scalar(
                OPS_NAME,
                DataType::new(crate::util::PlainOldDataType::Uint8, ops.len() as u8),
            ))
            .push(SampleData::from_values(ops));
        data.update_max_samples();
        IArchive::from_data("xf", data).unwrap()
    }

    fn schema(archive: &IArchive) -> Option<ISchema<'_>> {
        ISchema::new(archive.find_object("/xf")?, &XformHandler).ok()
    }

    #[test]
    fn test_ops_mismatch() {
        let a = xform(&[1, 2]);
        let b = xform(&[1, 2]);
        let c = xform(&[3]);
        let (sa, sb, sc) = (schema(&a), schema(&b), schema(&c));

        assert!(XformHandler.validate("/xf", &[sa, sb]).is_ok());
        assert!(matches!(
            XformHandler.validate("/xf", &[sa, None, sc]),
            Err(StitchError::XformOpsMismatch { input: 2, .. })
        ));
    }

    #[test]
    fn test_array_vals_keep_their_shape() {
        let mut data = xform(&[1]).data().clone();
        let compound = data.root.children[0].properties.compound_mut(".xform").unwrap();
        let vals = compound.add_array(PropertyHeader::array(".vals", DataType::FLOAT64));
        vals.push(ArraySample::from_values(&[1.0f64, 2.0, 3.0], 1));
        vals.push(ArraySample::from_values(&[4.0f64, 5.0, 6.0], 1));
        data.update_max_samples();
        let archive = IArchive::from_data("xf", data).unwrap();
        let input = schema(&archive).unwrap();
        assert_eq!(input.num_samples, 2);

        let registry = TimeAndSamplesMap::new();
        let mut samplings = TimeSamplingTable::new();
        let options = StitchOptions::default();
        let mut report = StitchReport::new(1);
        let mut ctx = StitchContext::new(&registry, &mut samplings, &options, &mut report);

        let mut out = XformHandler.create_output();
        let bound = out.bind(&mut ctx, 0, &input, "/xf/.xform").unwrap();
        out.set_from_input(&bound, 0).unwrap();
        out.set_from_input(&bound, 1).unwrap();
        XformHandler.tail_pad(&mut out, 3);
        assert!(report.skipped().is_empty());

        let mut compound = CompoundData::new(PropertyHeader::compound(".xform"));
        out.finish(&mut compound, 0);
        let Some(PropertyData::Array(vals)) = compound.get(".vals") else {
            panic!(".vals was not written as an array");
        };
        assert_eq!(vals.num_samples(), 3);
        assert_eq!(vals.samples[0].values::<f64>(), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(vals.samples[2].values::<f64>(), Some(vec![4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_scalar_vals_after_array_vals_are_skipped() {
        let mut data = xform(&[1]).data().clone();
        let compound = data.root.children[0].properties.compound_mut(".xform").unwrap();
        compound
            .add_array(PropertyHeader::array(".vals", DataType::FLOAT64))
            .push(ArraySample::from_values(&[1.0f64], 1));
        data.update_max_samples();
        let a = IArchive::from_data("a", data).unwrap();

        let mut data = xform(&[1]).data().clone();
        let compound = data.root.children[0].properties.compound_mut(".xform").unwrap();
        compound
            .add_scalar(PropertyHeader::scalar(".vals", DataType::FLOAT64))
            .push(SampleData::from_values(&[2.0f64]));
        data.update_max_samples();
        let b = IArchive::from_data("b", data).unwrap();

        let registry = TimeAndSamplesMap::new();
        let mut samplings = TimeSamplingTable::new();
        let options = StitchOptions::default();
        let mut report = StitchReport::new(2);
        let mut ctx = StitchContext::new(&registry, &mut samplings, &options, &mut report);

        let mut out = XformHandler.create_output();
        let bound_a = out.bind(&mut ctx, 0, &schema(&a).unwrap(), "/xf/.xform").unwrap();
        out.set_from_input(&bound_a, 0).unwrap();
        let bound_b = out.bind(&mut ctx, 1, &schema(&b).unwrap(), "/xf/.xform").unwrap();
        out.set_from_input(&bound_b, 0).unwrap();

        assert_eq!(report.skipped().len(), 1);
        assert_eq!(report.skipped()[0].path, "/xf/.xform/.vals");
        assert_eq!(out.field_len(".vals"), Some(2));
    }
}
