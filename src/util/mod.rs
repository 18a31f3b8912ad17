//! Utility types shared by the archive layer and the stitcher.
//!
//! - [`PlainOldDataType`] - Enum of basic data types
//! - [`DataType`] - POD + extent (dimensionality)
//! - [`Dimensions`] - Array sample shape
//! - [`Error`] / [`Result`] - Error handling

mod pod;
mod data_type;
mod error;
mod math;
mod dimensions;

pub use pod::*;
pub use data_type::*;
pub use error::*;
pub use math::*;
pub use dimensions::*;
