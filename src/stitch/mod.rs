//! Archive stitching.
//!
//! Several archives covering consecutive time ranges of the same scene are
//! merged into one archive that spans the whole range:
//!
//! - [`TimeAndSamplesMap`] - canonical time sampling per sampling type
//! - [`get_index_sample`] - where an input's samples land in the output
//! - [`visit_objects`] - object tree merge, dispatching on [`SchemaKind`]
//! - [`stitch_compound_prop`] - generic property merge
//! - [`stitch_files`] / [`stitch_archives`] - entry points
//!
//! ## Example
//!
//! ```ignore
//! use abc_stitch::stitch::{stitch_files, StitchOptions};
//!
//! let report = stitch_files("shot.abc", &["shot_a.abc", "shot_b.abc"], &StitchOptions::default())?;
//! println!("{}", report);
//! ```

mod context;
mod driver;
mod error;
mod geom_param;
mod index;
mod object;
mod options;
mod property;
mod report;
mod time_map;

pub mod schema;

pub use context::{OutputTrack, StitchContext};
pub use driver::{stitch_archives, stitch_files, APP_NAME};
pub use error::{SamplingField, StitchError};
pub use geom_param::{identity_indices, stitch_arb_geom_param, INDICES_NAME, VALS_NAME};
pub use index::{get_index_sample, SampleAlignment, TIME_TOLERANCE};
pub use object::visit_objects;
pub use options::{ChildMatching, MergePolicy, StitchOptions};
pub use property::{stitch_array_prop, stitch_compound_prop, stitch_property, stitch_scalar_prop};
pub use report::{SkipReason, SkippedProperty, StitchReport};
pub use schema::{ISchema, SchemaHandler, SchemaKind};
pub use time_map::TimeAndSamplesMap;
