//! Polygon mesh schema.

use super::{FieldSpec, SchemaHandler, SchemaKind};
use crate::util::DataType;

pub const POLYMESH_SCHEMA_PREFIX: &str = "AbcGeom_PolyMesh_v";

/// `.geom` fields of a polygon mesh.
pub static POLYMESH_FIELDS: [FieldSpec; 7] = [
    FieldSpec::scalar(".selfBnds", DataType::BOX3D).zero().required(),
    FieldSpec::array("P", DataType::VEC3F).required(),
    FieldSpec::array(".faceIndices", DataType::INT32).required(),
    FieldSpec::array(".faceCounts", DataType::INT32).required(),
    FieldSpec::array(".velocities", DataType::VEC3F),
    FieldSpec::param("N", DataType::VEC3F),
    FieldSpec::param("uv", DataType::VEC2F),
];

/// Empty gap samples, explicit empty tail.
pub struct PolyMeshHandler;

impl SchemaHandler for PolyMeshHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::PolyMesh
    }

    fn schema_prefix(&self) -> &'static str {
        POLYMESH_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &POLYMESH_FIELDS
    }
}
