//! Curves schema.

use super::{FieldSpec, SchemaHandler, SchemaKind};
use crate::util::{DataType, PlainOldDataType};

pub const CURVES_SCHEMA_PREFIX: &str = "AbcGeom_Curve_v";

/// Curve type, periodicity, basis type and basis step, one byte each.
pub const CURVE_BASIS_AND_TYPE: DataType = DataType::new(PlainOldDataType::Uint8, 4);

pub static CURVES_FIELDS: [FieldSpec; 11] = [
    FieldSpec::scalar(".selfBnds", DataType::BOX3D).zero().required(),
    FieldSpec::array("P", DataType::VEC3F).required(),
    FieldSpec::array("nVertices", DataType::INT32).required(),
    FieldSpec::scalar("curveBasisAndType", CURVE_BASIS_AND_TYPE).required(),
    FieldSpec::array(".velocities", DataType::VEC3F),
    FieldSpec::param("uv", DataType::VEC2F),
    FieldSpec::param("N", DataType::VEC3F),
    FieldSpec::param("width", DataType::FLOAT32),
    FieldSpec::array("w", DataType::FLOAT32),
    FieldSpec::array(".orders", DataType::UINT8),
    FieldSpec::array(".knots", DataType::FLOAT32),
];

pub struct CurvesHandler;

impl SchemaHandler for CurvesHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Curves
    }

    fn schema_prefix(&self) -> &'static str {
        CURVES_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &CURVES_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArraySample, PropertyHeader, SampleData};
    use crate::stitch::schema::testing::{array, gap_then_tail, scalar, single_object};

    #[test]
    fn test_gap_then_tail_is_empty_curves() {
        let basis = [1u8, 0, 2, 3];
        let archive = single_object(&CurvesHandler, "AbcGeom_Curve_v2", |geom| {
            geom.add_array(PropertyHeader::array("P", DataType::VEC3F))
                .push(ArraySample::from_values(&[0.0f32; 12], 3));
            geom.add_array(PropertyHeader::array("nVertices", DataType::INT32))
                .push(ArraySample::from_values(&[4i32], 1));
            geom.add_scalar(PropertyHeader::scalar("curveBasisAndType", CURVE_BASIS_AND_TYPE))
                .push(SampleData::from_values(&basis));
        });
        let geom = gap_then_tail(&CurvesHandler, &archive, 1, 3);

        let p = array(&geom, "P");
        let counts = array(&geom, "nVertices");
        assert_eq!((p.len(), counts.len()), (3, 3));
        assert!(p[0].is_empty() && counts[0].is_empty());
        assert_eq!(p[1].len(), 4);
        assert_eq!(counts[1].values::<i32>(), Some(vec![4]));
        assert!(p[2].is_empty() && counts[2].is_empty());

        // the gap has no basis yet; the tail keeps the last one
        let types = scalar(&geom, "curveBasisAndType");
        assert_eq!(types.len(), 3);
        assert_eq!(types[0], SampleData::zeroed(CURVE_BASIS_AND_TYPE));
        assert_eq!(types[2].values::<u8>(), Some(basis.to_vec()));
    }
}
