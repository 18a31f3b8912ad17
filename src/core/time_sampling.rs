//! Time sampling types.
//!
//! Every animated property refers to a [`TimeSampling`] that maps sample
//! indices to times. The [`TimeSamplingType`] is the repeating shape of that
//! mapping: how many samples make up one cycle and how long a cycle lasts.

use serde::{Deserialize, Serialize};

use crate::util::Chrono;

/// Samples-per-cycle value marking acyclic sampling.
pub const ACYCLIC_NUM_SAMPLES: u32 = u32::MAX;

/// Time-per-cycle value marking acyclic sampling.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

/// Shape of a time sampling: `samples_per_cycle` samples every
/// `time_per_cycle` seconds.
///
/// Uniform sampling is `(1, tpc)`, cyclic is `(n > 1, tpc)`. Acyclic sampling
/// uses the [`ACYCLIC_NUM_SAMPLES`] / [`ACYCLIC_TIME_PER_CYCLE`] sentinels.
/// Equality is exact on both fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSamplingType {
    pub samples_per_cycle: u32,
    pub time_per_cycle: Chrono,
}

impl TimeSamplingType {
    pub const fn uniform(time_per_cycle: Chrono) -> Self {
        Self { samples_per_cycle: 1, time_per_cycle }
    }

    pub const fn cyclic(samples_per_cycle: u32, time_per_cycle: Chrono) -> Self {
        Self { samples_per_cycle, time_per_cycle }
    }

    pub const fn acyclic() -> Self {
        Self {
            samples_per_cycle: ACYCLIC_NUM_SAMPLES,
            time_per_cycle: ACYCLIC_TIME_PER_CYCLE,
        }
    }

    #[inline]
    pub fn is_uniform(&self) -> bool {
        self.samples_per_cycle == 1
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        self.samples_per_cycle > 1 && self.samples_per_cycle != ACYCLIC_NUM_SAMPLES
    }

    #[inline]
    pub fn is_acyclic(&self) -> bool {
        self.samples_per_cycle == ACYCLIC_NUM_SAMPLES
    }
}

impl Default for TimeSamplingType {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

/// Concrete sample-index to time mapping.
///
/// `stored_times` holds the times of the first cycle (uniform: one entry,
/// cyclic: `samples_per_cycle` entries, acyclic: every sample time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSampling {
    pub sampling_type: TimeSamplingType,
    pub stored_times: Vec<Chrono>,
}

/// Identity sampling shared by properties that reference index 0.
pub static IDENTITY_TIME_SAMPLING: TimeSampling = TimeSampling::IDENTITY;

impl TimeSampling {
    /// Identity time sampling: uniform, one second per sample, from 0.
    pub const IDENTITY: Self = Self {
        sampling_type: TimeSamplingType::uniform(1.0),
        stored_times: Vec::new(),
    };

    /// Uniform sampling starting at `start_time`.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::uniform(time_per_cycle),
            stored_times: vec![start_time],
        }
    }

    /// Cyclic sampling. `times` are the sample times of the first cycle.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::cyclic(times.len().max(1) as u32, time_per_cycle),
            stored_times: times,
        }
    }

    /// Acyclic sampling with an explicit time per sample.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::acyclic(),
            stored_times: times,
        }
    }

    #[inline]
    pub fn sampling_type(&self) -> &TimeSamplingType {
        &self.sampling_type
    }

    #[inline]
    pub fn is_acyclic(&self) -> bool {
        self.sampling_type.is_acyclic()
    }

    /// True for the default uniform 1.0 sampling starting at 0.
    pub fn is_identity(&self) -> bool {
        self.sampling_type == TimeSamplingType::uniform(1.0) && self.start_time() == 0.0
    }

    /// Same type and same first-cycle times, regardless of how the times
    /// are stored.
    pub fn is_equivalent(&self, other: &TimeSampling) -> bool {
        if self.sampling_type != other.sampling_type {
            return false;
        }
        let n = self.stored_times.len().max(other.stored_times.len()).max(1);
        (0..n).all(|i| self.sample_time(i) == other.sample_time(i))
    }

    pub fn stored_times(&self) -> &[Chrono] {
        &self.stored_times
    }

    /// Time of sample 0.
    #[inline]
    pub fn start_time(&self) -> Chrono {
        self.sample_time(0)
    }

    /// Time of sample `index`.
    pub fn sample_time(&self, index: usize) -> Chrono {
        let times = &self.stored_times;
        if times.is_empty() {
            return index as Chrono * self.uniform_step();
        }

        let tst = &self.sampling_type;
        if tst.is_acyclic() {
            times[index.min(times.len() - 1)]
        } else if tst.is_uniform() {
            times[0] + index as Chrono * tst.time_per_cycle
        } else {
            let n = times.len();
            let cycle = index / n;
            times[index % n] + cycle as Chrono * tst.time_per_cycle
        }
    }

    fn uniform_step(&self) -> Chrono {
        if self.sampling_type.is_acyclic() {
            0.0
        } else {
            self.sampling_type.time_per_cycle
        }
    }

    /// Largest index whose time is `<= time`, clamped to `[0, num_samples)`.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let min_time = self.sample_time(0);
        if time <= min_time {
            return (0, min_time);
        }

        let max_index = num_samples - 1;
        if self.sampling_type.is_acyclic() {
            let max_time = self.sample_time(max_index);
            if time >= max_time {
                return (max_index, max_time);
            }
        }

        let idx = if self.sampling_type.is_uniform() && !self.stored_times.is_empty() {
            let tpc = self.sampling_type.time_per_cycle;
            let raw = ((time - min_time) / tpc).floor();
            let mut idx = if raw >= max_index as f64 { max_index } else { raw as usize };
            // Division can land one step off either way.
            while idx < max_index && self.sample_time(idx + 1) <= time {
                idx += 1;
            }
            while idx > 0 && self.sample_time(idx) > time {
                idx -= 1;
            }
            idx
        } else {
            // First index with time > target, minus one.
            let mut lo = 0usize;
            let mut hi = max_index;
            if self.sample_time(hi) <= time {
                return (hi, self.sample_time(hi));
            }
            while lo + 1 < hi {
                let mid = lo + (hi - lo) / 2;
                if self.sample_time(mid) <= time {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            lo
        };

        (idx, self.sample_time(idx))
    }

    /// Smallest index whose time is `>= time`, clamped to `[0, num_samples)`.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_time >= time || floor_idx + 1 >= num_samples {
            return (floor_idx, floor_time);
        }

        let ceil_idx = floor_idx + 1;
        (ceil_idx, self.sample_time(ceil_idx))
    }

    /// Index whose time is closest to `time`. Ties go to the ceiling index.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        let (ceil_idx, ceil_time) = self.ceil_index(time, num_samples);

        if time - floor_time < ceil_time - time {
            (floor_idx, floor_time)
        } else {
            (ceil_idx, ceil_time)
        }
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::IDENTITY
    }
}
