//! Core layer - fundamental archive types.
//!
//! - [`TimeSampling`] - Time sampling for animated properties
//! - [`MetaData`] - Key-value metadata storage
//! - [`ObjectHeader`] / [`PropertyHeader`] - Headers for objects and properties
//! - [`SampleData`] / [`ArraySample`] - Sample payloads

mod time_sampling;
mod metadata;
mod header;
mod sample;
mod compression;

pub use time_sampling::{
    TimeSampling, TimeSamplingType, ACYCLIC_NUM_SAMPLES, ACYCLIC_TIME_PER_CYCLE,
    IDENTITY_TIME_SAMPLING,
};
pub use metadata::MetaData;
pub use header::{ObjectHeader, PropertyHeader, PropertyType};
pub use sample::{ArraySample, SampleData};
pub use compression::{compress, compression_level, decompress};
