//! # abc-stitch
//!
//! Merge Alembic-style scene archives that cover consecutive time ranges of
//! the same scene into one archive spanning the whole range.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (POD, DataType, errors)
//! - [`core`] - Time sampling, metadata, headers and samples
//! - [`abc`] - Archive API (IArchive, OArchive, objects, properties) and backends
//! - [`stitch`] - Time sampling registry, object and property merging
//!
//! ## Example
//!
//! ```ignore
//! use abc_stitch::stitch::{stitch_files, StitchOptions};
//!
//! let report = stitch_files("out.abc", &["frames_1_50.abc", "frames_51_100.abc"], &StitchOptions::default())?;
//! eprintln!("{}", report);
//! ```

pub mod util;
pub mod core;
pub mod abc;
pub mod stitch;

// Re-export commonly used types
pub use util::{DataType, PlainOldDataType, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DataType, PlainOldDataType, Error, Result};
    pub use crate::abc::{IArchive, OArchive, IObject};
    pub use crate::core::{TimeSampling, TimeSamplingType, MetaData};
    pub use crate::stitch::{stitch_files, stitch_archives, StitchOptions, StitchReport, StitchError};
}
