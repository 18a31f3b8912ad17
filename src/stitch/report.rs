//! Summary of a stitch run.

use std::collections::BTreeMap;
use std::fmt;

use super::schema::SchemaKind;
use crate::core::PropertyType;
use crate::util::{DataType, PlainOldDataType};

/// Why an input's property was left out of the output.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    DataTypeMismatch { expected: DataType, actual: DataType },
    PropertyTypeMismatch { expected: PropertyType, actual: PropertyType },
    UnsupportedPod(PlainOldDataType),
    /// Present on some inputs only, where all inputs must carry it.
    PartialPresence,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataTypeMismatch { expected, actual } => {
                write!(f, "data type {} does not match {}", actual, expected)
            }
            Self::PropertyTypeMismatch { expected, actual } => {
                write!(f, "{} property where {} was expected", actual.name(), expected.name())
            }
            Self::UnsupportedPod(pod) => write!(f, "unsupported POD {}", pod),
            Self::PartialPresence => f.write_str("not present on every input"),
        }
    }
}

/// One skipped (property, input) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedProperty {
    /// Object path plus property path, e.g. `/xform/mesh/.geom/uv`.
    pub path: String,
    /// Position of the input in stitch order.
    pub input: usize,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (input {}): {}", self.path, self.input, self.reason)
    }
}

/// Counts and skips collected while stitching.
#[derive(Clone, Debug, Default)]
pub struct StitchReport {
    pub inputs: usize,
    objects: BTreeMap<SchemaKind, usize>,
    pub properties: usize,
    pub skipped: Vec<SkippedProperty>,
}

impl StitchReport {
    pub fn new(inputs: usize) -> Self {
        Self { inputs, ..Default::default() }
    }

    pub fn record_object(&mut self, kind: SchemaKind) {
        *self.objects.entry(kind).or_default() += 1;
    }

    pub fn record_property(&mut self) {
        self.properties += 1;
    }

    pub fn record_skip(&mut self, path: impl Into<String>, input: usize, reason: SkipReason) {
        let path = path.into();
        tracing::warn!("skipping {} from input {}: {}", path, input, reason);
        self.skipped.push(SkippedProperty { path, input, reason });
    }

    /// Objects written for `kind`.
    pub fn objects(&self, kind: SchemaKind) -> usize {
        self.objects.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_objects(&self) -> usize {
        self.objects.values().sum()
    }

    pub fn skipped(&self) -> &[SkippedProperty] {
        &self.skipped
    }
}

impl fmt::Display for StitchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inputs, {} objects (",
            self.inputs,
            self.total_objects()
        )?;
        for (i, (kind, n)) in self.objects.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", n, kind)?;
        }
        write!(f, "), {} properties, {} skipped", self.properties, self.skipped.len())
    }
}
