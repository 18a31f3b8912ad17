//! Scalar time helpers.

/// Chrono type - time value (seconds).
pub type Chrono = f64;

/// Absolute-error float comparison (`|a - b| <= tolerance`).
#[inline]
pub fn equal_with_abs_error(a: Chrono, b: Chrono, tolerance: Chrono) -> bool {
    (a - b).abs() <= tolerance
}
