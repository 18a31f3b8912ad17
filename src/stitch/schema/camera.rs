//! Camera schema.

use super::{BoundInput, FieldSpec, FieldValue, OSchema, SchemaHandler, SchemaKind};
use crate::core::SampleData;
use crate::stitch::index::SampleAlignment;
use crate::util::{DataType, PlainOldDataType, Result};

pub const CAMERA_SCHEMA_PREFIX: &str = "AbcGeom_Camera_v";

/// `.core` holds sixteen doubles.
pub const CAMERA_CORE_TYPE: DataType = DataType::new(PlainOldDataType::Float64, 16);

/// Default camera: focal length, apertures and film offsets, lens squeeze,
/// four overscans, f-stop, focus distance, shutter open/close, near/far.
pub const DEFAULT_CAMERA_CORE: [f64; 16] = [
    35.0,
    3.6,
    0.0,
    2.4,
    0.0,
    1.0,
    0.0,
    0.0,
    0.0,
    0.0,
    5.6,
    5.0,
    0.0,
    1.0 / 48.0,
    0.1,
    100000.0,
];

pub static CAMERA_FIELDS: [FieldSpec; 3] = [
    FieldSpec::scalar(".core", CAMERA_CORE_TYPE).required(),
    FieldSpec::array(".filmBackChannels", DataType::FLOAT64),
    FieldSpec::array(".filmBackOps", DataType::STRING).constant(),
];

/// Gaps write the default camera; the tail repeats the last sample.
pub struct CameraHandler;

impl SchemaHandler for CameraHandler {
    fn kind(&self) -> SchemaKind {
        SchemaKind::Camera
    }

    fn schema_prefix(&self) -> &'static str {
        CAMERA_SCHEMA_PREFIX
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &CAMERA_FIELDS
    }

    fn gap_fill(&self, out: &mut OSchema, _input: &BoundInput<'_>, align: SampleAlignment) -> Result<()> {
        let core = &CAMERA_FIELDS[0];
        let data_type = out.field_type(core.name).unwrap_or(CAMERA_CORE_TYPE);
        for _ in 0..align.num_empty {
            out.set_value(core, FieldValue::Scalar(default_core(data_type)));
            out.commit();
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
}

/// Default `.core` sample, zeroed when the stored type is not sixteen
/// doubles.
pub fn default_core(data_type: DataType) -> SampleData {
    if data_type == CAMERA_CORE_TYPE {
        SampleData::from_values(&DEFAULT_CAMERA_CORE)
    } else {
        SampleData::zeroed(data_type)
    }
}
