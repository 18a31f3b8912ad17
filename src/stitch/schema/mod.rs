//! Schema objects and their per-type sample transfer rules.
//!
//! - [`SchemaKind`] - recognized object type
//! - [`SchemaHandler`] - identify, create, transfer, gap-fill and pad
//! - [`ISchema`] - one input's schema compound
//! - [`OSchema`] - buffered output schema, written on finish

mod fields;
#[cfg(test)]
mod testing;

pub mod camera;
pub mod curves;
pub mod nupatch;
pub mod points;
pub mod polymesh;
pub mod subd;
pub mod xform;

use std::fmt;

pub use fields::{BoundInput, FieldShape, FieldSpec, FieldValue, OSchema, OnEmpty};

use super::error::StitchError;
use super::geom_param::VALS_NAME;
use super::index::SampleAlignment;
use crate::abc::{ICompoundProperty, IObject, IProperty};
use crate::core::{MetaData, ObjectHeader, TimeSampling, IDENTITY_TIME_SAMPLING};
use crate::util::{Error, Result};

pub use camera::CameraHandler;
pub use curves::CurvesHandler;
pub use nupatch::NuPatchHandler;
pub use points::PointsHandler;
pub use polymesh::PolyMeshHandler;
pub use subd::SubDHandler;
pub use xform::XformHandler;

/// Child bounds property inside a schema compound.
pub const CHILD_BOUNDS_NAME: &str = ".childBnds";
pub const ARB_GEOM_PARAMS_NAME: &str = ".arbGeomParams";
pub const USER_PROPERTIES_NAME: &str = ".userProperties";
/// Visibility property on an object's top compound.
pub const VISIBILITY_NAME: &str = "visible";

// ============================================================================
// Kinds
// ============================================================================

/// Recognized object types. Anything else is stitched generically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaKind {
    Xform,
    PolyMesh,
    SubD,
    Camera,
    Curves,
    Points,
    NuPatch,
    Generic,
}

impl SchemaKind {
    /// Identify the object type from its header.
    pub fn identify(header: &ObjectHeader) -> Self {
        HANDLERS
            .iter()
            .find(|h| h.identify(header))
            .map(|h| h.kind())
            .unwrap_or(Self::Generic)
    }

    pub fn handler(self) -> Option<&'static dyn SchemaHandler> {
        HANDLERS.iter().copied().find(|h| h.kind() == self)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Xform => "xform",
            Self::PolyMesh => "polymesh",
            Self::SubD => "subd",
            Self::Camera => "camera",
            Self::Curves => "curves",
            Self::Points => "points",
            Self::NuPatch => "nupatch",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static HANDLERS: [&dyn SchemaHandler; 7] = [
    &XformHandler,
    &PolyMeshHandler,
    &SubDHandler,
    &CameraHandler,
    &CurvesHandler,
    &PointsHandler,
    &NuPatchHandler,
];

// ============================================================================
// Handler
// ============================================================================

/// Per-type rules for moving samples from inputs to the output schema.
pub trait SchemaHandler: Sync {
    fn kind(&self) -> SchemaKind;

    /// Schema title prefix, e.g. `AbcGeom_PolyMesh_v`.
    fn schema_prefix(&self) -> &'static str;

    /// Schema compound name used when `schemaObjTitle` is missing.
    fn default_compound(&self) -> &'static str {
        ".geom"
    }

    fn fields(&self) -> &'static [FieldSpec];

    fn identify(&self, header: &ObjectHeader) -> bool {
        header.meta_data.matches_schema_prefix(self.schema_prefix())
    }

    fn create_output(&self) -> OSchema {
        OSchema::new(self.kind(), self.fields())
    }

    /// Copy sample `index` of a bound input.
    fn transfer_sample(&self, out: &mut OSchema, input: &BoundInput<'_>, index: usize) -> Result<()> {
        out.set_from_input(input, index)
    }

    /// Write the gap samples that precede an input's first copied sample.
    fn gap_fill(&self, out: &mut OSchema, _input: &BoundInput<'_>, align: SampleAlignment) -> Result<()> {
        for _ in 0..align.num_empty {
            out.set_empty();
        }
        Ok(())
    }

    /// Extend the output to `expected` samples after every input is done.
    fn tail_pad(&self, out: &mut OSchema, expected: usize) {
        while out.num_samples() < expected {
            out.set_empty();
        }
    }

    /// Type-specific cross-input checks.
    fn validate(&self, _path: &str, _inputs: &[Option<ISchema<'_>>]) -> Result<(), StitchError> {
        Ok(())
    }
}

// ============================================================================
// Input schema
// ============================================================================

/// One input's schema compound with its sample count and time sampling.
#[derive(Clone, Copy)]
pub struct ISchema<'a> {
    pub object: IObject<'a>,
    pub compound: ICompoundProperty<'a>,
    /// Sampling of the first per-sample field found, identity if none.
    pub time_sampling: &'a TimeSampling,
    /// Name of the property `time_sampling` was taken from.
    pub time_source: &'a str,
    /// Largest sample count over the per-sample fields.
    pub num_samples: usize,
}

impl<'a> ISchema<'a> {
    pub fn new(object: IObject<'a>, handler: &dyn SchemaHandler) -> Result<Self> {
        let name = compound_name(object.meta_data(), handler);
        let compound = object.properties().compound(name).ok_or_else(|| {
            Error::invalid(format!("{}: missing schema compound {}", object.full_name(), name))
        })?;

        let mut time_sampling = &IDENTITY_TIME_SAMPLING;
        let mut time_source = compound.name();
        let mut num_samples = 0;
        let mut found = false;
        for spec in handler.fields().iter().filter(|s| !s.constant) {
            let Some(prop) = compound.property(spec.name) else {
                continue;
            };
            let sampled = match prop {
                IProperty::Compound(c) => c.array(VALS_NAME).map(IProperty::Array),
                other => Some(other),
            };
            let Some(sampled) = sampled else { continue };
            if !found {
                if let Some(ts) = sampled.time_sampling() {
                    time_sampling = ts;
                    time_source = prop.name();
                    found = true;
                }
            }
            num_samples = num_samples.max(sampled.num_samples());
        }

        Ok(Self {
            object,
            compound,
            time_sampling,
            time_source,
            num_samples,
        })
    }

    pub fn path(&self) -> &'a str {
        self.object.full_name()
    }
}

/// Schema compound name from `schemaObjTitle` (`<title>:<compound>`).
pub fn compound_name<'m>(meta: &'m MetaData, handler: &dyn SchemaHandler) -> &'m str {
    meta.schema_obj_title()
        .and_then(|t| t.split_once(':'))
        .map(|(_, c)| c)
        .filter(|c| !c.is_empty())
        .unwrap_or(handler.default_compound())
}
