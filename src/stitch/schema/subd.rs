//! Subdivision surface schema.

use super::{FieldSpec, SchemaHandler, SchemaKind};
use crate::util::DataType;

pub const SUBD_SCHEMA_PREFIX: &str = "AbcGeom_SubD_v";

/// `.geom` fields of a subdivision surface: mesh topology plus scheme,
/// boundary rules, creases, corners and holes.
pub static SUBD_FIELDS: [FieldSpec; 16] = [
    FieldSpec::scalar(".selfBnds", DataType::BOX3D).zero().required(),
    FieldSpec::array("P", DataType::VEC3F).required(),
    FieldSpec::array(".faceIndices", DataType::INT32).required(),
    FieldSpec::array(".faceCounts", DataType::INT32).required(),
    FieldSpec::array(".velocities", DataType::VEC3F),
    FieldSpec::param("uv", DataType::VEC2F),
    FieldSpec::scalar(".scheme", DataType::STRING),
    FieldSpec::scalar(".faceVaryingInterpolateBoundary", DataType::INT32),
    FieldSpec::scalar(".faceVaryingPropagateCorners", DataType::INT32),
    FieldSpec::scalar(".interpolateBoundary", DataType::INT32),
    FieldSpec::array(".creaseIndices", DataType::INT32),
    FieldSpec::array(".creaseLengths", DataType::INT32),
    FieldSpec::array(".creaseSharpnesses", DataType::FLOAT32),
    FieldSpec::array(".cornerIndices", DataType::INT32),
    FieldSpec::array(".cornerSharpnesses", DataType::FLOAT32),
    FieldSpec::array(".holes", DataType::INT32),
];

pub struct SubDHandler;

impl SchemaHandler for SubDHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::SubD
    }

    fn schema_prefix(&self) -> &'static str {
        SUBD_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &SUBD_FIELDS
    }
}
