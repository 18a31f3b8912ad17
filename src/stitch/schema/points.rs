//! Point cloud schema.

use super::{FieldSpec, SchemaHandler, SchemaKind};
use crate::util::DataType;

pub const POINTS_SCHEMA_PREFIX: &str = "AbcGeom_Points_v";

pub static POINTS_FIELDS: [FieldSpec; 5] = [
    FieldSpec::scalar(".selfBnds", DataType::BOX3D).zero().required(),
    FieldSpec::array("P", DataType::VEC3F).required(),
    FieldSpec::array(".pointIds", DataType::UINT64).required(),
    FieldSpec::array(".velocities", DataType::VEC3F),
    FieldSpec::param(".widths", DataType::FLOAT32),
];

pub struct PointsHandler;

impl SchemaHandler for PointsHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Points
    }

    fn schema_prefix(&self) -> &'static str {
        POINTS_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &POINTS_FIELDS
    }
}
