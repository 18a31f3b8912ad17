//! Alignment of an input sample stream against the output write cursor.

use crate::core::TimeSampling;
use crate::util::{equal_with_abs_error, Chrono};

/// Absolute tolerance when comparing input and output sample times.
pub const TIME_TOLERANCE: Chrono = 1e-5;

/// Where to start copying an input and how many gap samples to write first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleAlignment {
    /// First input sample to copy. Equal to the input sample count when the
    /// input has nothing left to contribute.
    pub start: usize,
    /// Gap samples to emit before copying.
    pub num_empty: usize,
}

/// Align an input with `in_num_samples` samples on `in_time` to an output
/// that already holds `cur_out_index` samples on `out_time`.
pub fn get_index_sample(
    cur_out_index: usize,
    out_time: &TimeSampling,
    in_num_samples: usize,
    in_time: &TimeSampling,
) -> SampleAlignment {
    let cur_time = out_time.sample_time(cur_out_index);
    let in_start = in_time.sample_time(0);

    let num_empty = if cur_time < in_start {
        let empty_end = out_time.near_index(in_start, usize::MAX).0;
        empty_end.saturating_sub(cur_out_index)
    } else {
        0
    };

    let start = (0..in_num_samples)
        .find(|&i| {
            let t = in_time.sample_time(i);
            cur_time <= t || equal_with_abs_error(cur_time, t, TIME_TOLERANCE)
        })
        .unwrap_or(in_num_samples);

    SampleAlignment { start, num_empty }
}
