//! State threaded through one stitch traversal.

use super::error::StitchError;
use super::options::StitchOptions;
use super::report::{SkipReason, StitchReport};
use super::time_map::TimeAndSamplesMap;
use crate::abc::{ArchiveWriter, CompoundData, TimeSamplingTable};
use crate::core::TimeSampling;

/// Canonical output time track for one property or schema.
#[derive(Clone, Debug)]
pub struct OutputTrack {
    pub sampling: TimeSampling,
    /// Index in the output archive's time sampling table.
    pub index: u32,
    /// Sample count the output must reach after tail padding.
    pub expected: usize,
}

/// Registry, output time samplings, options and report for one run.
pub struct StitchContext<'s> {
    pub registry: &'s TimeAndSamplesMap,
    pub samplings: &'s mut TimeSamplingTable,
    pub options: &'s StitchOptions,
    pub report: &'s mut StitchReport,
    /// Output writer taking finished property samples, if streaming.
    writer: Option<&'s mut dyn ArchiveWriter>,
}

impl<'s> StitchContext<'s> {
    pub fn new(
        registry: &'s TimeAndSamplesMap,
        samplings: &'s mut TimeSamplingTable,
        options: &'s StitchOptions,
        report: &'s mut StitchReport,
    ) -> Self {
        Self { registry, samplings, options, report, writer: None }
    }

    pub fn with_writer(mut self, writer: &'s mut dyn ArchiveWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Hand the samples of a finished object's properties to the writer.
    pub fn spill(&mut self, compound: &mut CompoundData) -> Result<(), StitchError> {
        if let Some(writer) = self.writer.as_deref_mut() {
            writer.spill(compound)?;
        }
        Ok(())
    }

    /// Resolve the canonical track for `sampling` and register it with the
    /// output archive. Unregistered shapes keep the input sampling and
    /// expect no padding.
    pub fn track(&mut self, sampling: &TimeSampling) -> OutputTrack {
        let (sampling, expected) = match self.registry.get(sampling) {
            Some((canonical, expected)) => (canonical.clone(), expected),
            None => (sampling.clone(), 0),
        };
        let index = self.samplings.add(sampling.clone());
        OutputTrack { sampling, index, expected }
    }

    /// Leave input `input` out of the property at `path`.
    ///
    /// Under [`MergePolicy::Strict`](super::MergePolicy::Strict) a data type
    /// mismatch is an error instead.
    pub fn skip(&mut self, path: &str, input: usize, reason: SkipReason) -> Result<(), StitchError> {
        if self.options.is_strict() {
            if let SkipReason::DataTypeMismatch { expected, actual } = reason {
                return Err(StitchError::DataTypeMismatch {
                    path: path.to_string(),
                    input,
                    expected,
                    actual,
                });
            }
        }
        self.report.record_skip(path, input, reason);
        Ok(())
    }
}

/// `parent/name`, used for report and error paths.
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    match parent {
        "" => name.to_string(),
        "/" => format!("/{}", name),
        _ => format!("{}/{}", parent, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stitch::MergePolicy;
    use crate::util::DataType;

    #[test]
    fn test_track_registers_canonical() {
        let mut registry = TimeAndSamplesMap::new();
        let a = TimeSampling::uniform(0.5, 1.0);
        let b = TimeSampling::uniform(0.5, 2.0);
        registry.add(&a, 2);
        registry.add(&b, 2);

        let mut samplings = TimeSamplingTable::new();
        let options = StitchOptions::default();
        let mut report = StitchReport::new(2);
        let mut ctx = StitchContext::new(&registry, &mut samplings, &options, &mut report);

        let track = ctx.track(&b);
        assert_eq!(track.sampling, a);
        assert_eq!(track.index, 1);
        assert_eq!(track.expected, 4);
        assert_eq!(ctx.track(&a).index, 1);

        let unknown = ctx.track(&TimeSampling::uniform(3.0, 0.0));
        assert_eq!(unknown.expected, 0);
        assert_eq!(unknown.index, 2);
    }

    #[test]
    fn test_skip_policy() {
        let registry = TimeAndSamplesMap::new();
        let mut samplings = TimeSamplingTable::new();
        let mut report = StitchReport::new(2);
        let mismatch = SkipReason::DataTypeMismatch {
            expected: DataType::FLOAT32,
            actual: DataType::INT32,
        };

        let lenient = StitchOptions::default();
        let mut ctx = StitchContext::new(&registry, &mut samplings, &lenient, &mut report);
        assert!(ctx.skip("/a/x", 1, mismatch.clone()).is_ok());
        assert_eq!(report.skipped().len(), 1);

        let strict = StitchOptions::new().with_merge_policy(MergePolicy::Strict);
        let mut ctx = StitchContext::new(&registry, &mut samplings, &strict, &mut report);
        assert!(matches!(
            ctx.skip("/a/x", 1, mismatch),
            Err(StitchError::DataTypeMismatch { input: 1, .. })
        ));
        assert!(ctx.skip("/a/y", 1, SkipReason::PartialPresence).is_ok());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "xform"), "/xform");
        assert_eq!(join_path("/xform", ".geom"), "/xform/.geom");
        assert_eq!(join_path("", "P"), "P");
    }
}
