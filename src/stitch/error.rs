//! Cross-archive inconsistency errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::{Chrono, DataType, Error};

/// Which part of two time sampling types differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingField {
    SamplesPerCycle,
    TimePerCycle,
}

impl fmt::Display for SamplingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SamplesPerCycle => "samples per cycle",
            Self::TimePerCycle => "time per cycle",
        })
    }
}

/// Fatal stitch errors. Any of these aborts the whole run.
#[derive(Error, Debug)]
pub enum StitchError {
    #[error("{path}: {property} has mismatched {field} between inputs ({first} vs {other})")]
    TimeSamplingMismatch {
        path: String,
        property: String,
        field: SamplingField,
        first: String,
        other: String,
    },

    #[error("{path}: {property} uses acyclic time sampling, which cannot be stitched")]
    AcyclicSampling { path: String, property: String },

    #[error("{path}: child bounds present in some inputs but not in input {input}")]
    ChildBoundsPresence { path: String, input: usize },

    #[error("{path}: mismatched child counts ({expected} vs {actual} in input {input})")]
    ChildCountMismatch {
        path: String,
        input: usize,
        expected: usize,
        actual: usize,
    },

    #[error("overlapping frame range: {first} and {second} both start at {time}")]
    OverlappingFrameRange {
        first: PathBuf,
        second: PathBuf,
        time: Chrono,
    },

    #[error("{path}: transform operations differ in input {input}")]
    XformOpsMismatch { path: String, input: usize },

    #[error("{path}: input {input} has data type {actual}, expected {expected}")]
    DataTypeMismatch {
        path: String,
        input: usize,
        expected: DataType,
        actual: DataType,
    },

    #[error("at least two input archives are required, got {0}")]
    NotEnoughInputs(usize),

    #[error("cannot create output archive {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: Error,
    },

    #[error(transparent)]
    Storage(#[from] Error),
}

impl StitchError {
    /// Process exit code for this error: `-1` when the output could not be
    /// created, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::OutputCreate { .. } | Self::NotEnoughInputs(_) => -1,
            _ => 1,
        }
    }
}
