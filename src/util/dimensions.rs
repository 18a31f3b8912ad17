//! Array sample dimensions.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Shape of an array sample.
///
/// Most samples are rank 1. An empty-dimensioned sample (`[0]`) is what the
/// stitcher writes for array gaps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    dims: SmallVec<[usize; 4]>,
}

impl Dimensions {
    /// Rank 0 dimensions.
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    pub fn d1(size: usize) -> Self {
        Self { dims: smallvec::smallvec![size] }
    }

    /// The zero-length shape used for gap samples.
    pub fn empty() -> Self {
        Self::d1(0)
    }

    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements (product of all dimensions).
    pub fn num_points(&self) -> usize {
        if self.dims.is_empty() {
            1
        } else {
            self.dims.iter().product()
        }
    }
}

impl From<usize> for Dimensions {
    fn from(size: usize) -> Self {
        Self::d1(size)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_shape() {
        let d = Dimensions::empty();
        assert_eq!(d.rank(), 1);
        assert_eq!(d.num_points(), 0);
        assert_eq!(format!("{}", d), "[0]");
    }

    #[test]
    fn test_points() {
        assert_eq!(Dimensions::scalar().num_points(), 1);
        assert_eq!(Dimensions::from_slice(&[4, 3]).num_points(), 12);
        let d: Dimensions = 7.into();
        assert_eq!(d.sizes(), &[7]);
    }
}
