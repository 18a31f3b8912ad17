//! Registry of canonical time samplings across all inputs.
//!
//! Entries are keyed by [`TimeSamplingType`] only: two unrelated properties
//! with the same cycle shape share one output track.

use crate::core::{TimeSampling, TimeSamplingType};

#[derive(Clone, Debug)]
struct Entry {
    sampling: TimeSampling,
    expected: usize,
}

/// Canonical sampling and expected output sample count per sampling type.
#[derive(Clone, Debug, Default)]
pub struct TimeAndSamplesMap {
    entries: Vec<Entry>,
}

impl TimeAndSamplesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sampling` with `num_samples` samples (0 counts as 1).
    ///
    /// When the type is already known, the earlier-starting sampling stays
    /// canonical and the expected count grows to cover the later of both
    /// end times.
    pub fn add(&mut self, sampling: &TimeSampling, num_samples: usize) {
        let num_samples = num_samples.max(1);

        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.sampling.sampling_type == sampling.sampling_type)
        else {
            self.entries.push(Entry {
                sampling: sampling.clone(),
                expected: num_samples,
            });
            return;
        };

        let cur_last = entry.sampling.sample_time(entry.expected);
        let last = sampling.sample_time(num_samples).max(cur_last);

        if entry.sampling.start_time() > sampling.start_time() {
            entry.sampling = sampling.clone();
        }
        entry.expected = entry.sampling.near_index(last, usize::MAX).0;
    }

    /// Canonical sampling for `sampling`'s type and the expected sample
    /// count. `None` means nothing is expected for that type.
    pub fn get(&self, sampling: &TimeSampling) -> Option<(&TimeSampling, usize)> {
        self.get_type(&sampling.sampling_type)
    }

    pub fn get_type(&self, tst: &TimeSamplingType) -> Option<(&TimeSampling, usize)> {
        self.entries
            .iter()
            .find(|e| e.sampling.sampling_type == *tst)
            .map(|e| (&e.sampling, e.expected))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
