//! NURBS patch schema.
//!
//! Empty samples zero the patch topology scalars (`nu`, `nv`, orders and
//! trim loop count) along with emptying every array.

use super::{FieldSpec, SchemaHandler, SchemaKind};
use crate::util::DataType;

pub const NUPATCH_SCHEMA_PREFIX: &str = "AbcGeom_NuPatch_v";

pub static NUPATCH_FIELDS: [FieldSpec; 22] = [
    FieldSpec::scalar(".selfBnds", DataType::BOX3D).zero().required(),
    FieldSpec::array("P", DataType::VEC3F).required(),
    FieldSpec::scalar("nu", DataType::INT32).zero().required(),
    FieldSpec::scalar("nv", DataType::INT32).zero().required(),
    FieldSpec::scalar("uOrder", DataType::INT32).zero().required(),
    FieldSpec::scalar("vOrder", DataType::INT32).zero().required(),
    FieldSpec::array("uKnot", DataType::FLOAT32).required(),
    FieldSpec::array("vKnot", DataType::FLOAT32).required(),
    FieldSpec::array("w", DataType::FLOAT32),
    FieldSpec::array(".velocities", DataType::VEC3F),
    FieldSpec::param("uv", DataType::VEC2F),
    FieldSpec::param("N", DataType::VEC3F),
    FieldSpec::scalar("trim_nloops", DataType::INT32).zero(),
    FieldSpec::array("trim_ncurves", DataType::INT32),
    FieldSpec::array("trim_n", DataType::INT32),
    FieldSpec::array("trim_order", DataType::INT32),
    FieldSpec::array("trim_knot", DataType::FLOAT32),
    FieldSpec::array("trim_min", DataType::FLOAT32),
    FieldSpec::array("trim_max", DataType::FLOAT32),
    FieldSpec::array("trim_u", DataType::FLOAT32),
    FieldSpec::array("trim_v", DataType::FLOAT32),
    FieldSpec::array("trim_w", DataType::FLOAT32),
];

pub struct NuPatchHandler;

impl SchemaHandler for NuPatchHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::NuPatch
    }

    fn schema_prefix(&self) -> &'static str {
        NUPATCH_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &NUPATCH_FIELDS
    }
}
