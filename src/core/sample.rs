//! Sample values stored by scalar and array properties.

use serde::{Deserialize, Serialize};

use crate::util::{AlembicPod, DataType, Dimensions, PlainOldDataType};

/// Raw payload of one sample.
///
/// Numeric PODs are kept as little-endian bytes, strings as owned strings
/// (one per component).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SampleData {
    Pod(Vec<u8>),
    Strings(Vec<String>),
}

impl SampleData {
    /// Zero-valued sample of `data_type` (empty strings for string PODs).
    pub fn zeroed(data_type: DataType) -> Self {
        if data_type.pod.is_string() {
            Self::Strings(vec![String::new(); data_type.extent as usize])
        } else {
            Self::Pod(vec![0u8; data_type.num_bytes()])
        }
    }

    /// Zero-length payload matching `pod`.
    pub fn empty(pod: PlainOldDataType) -> Self {
        if pod.is_string() {
            Self::Strings(Vec::new())
        } else {
            Self::Pod(Vec::new())
        }
    }

    pub fn from_values<T: AlembicPod>(values: &[T]) -> Self {
        Self::Pod(bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::Strings(values.into_iter().map(Into::into).collect())
    }

    /// Reinterpret the bytes as `T`. `None` for string payloads or when the
    /// byte count is not a multiple of `size_of::<T>()`.
    pub fn values<T: AlembicPod>(&self) -> Option<Vec<T>> {
        match self {
            Self::Pod(bytes) if bytes.len() % std::mem::size_of::<T>() == 0 => {
                Some(bytemuck::pod_collect_to_vec(bytes))
            }
            _ => None,
        }
    }

    pub fn strings(&self) -> Option<&[String]> {
        match self {
            Self::Strings(s) => Some(s),
            Self::Pod(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Pod(b) => Some(b),
            Self::Strings(_) => None,
        }
    }

    /// Number of components (bytes / POD size, or string count).
    pub fn num_components(&self, pod: PlainOldDataType) -> usize {
        match self {
            Self::Strings(s) => s.len(),
            Self::Pod(b) => match pod.num_bytes() {
                0 => 0,
                n => b.len() / n,
            },
        }
    }

    /// Check the payload layout against `data_type` for a sample holding
    /// `num_elements` elements.
    pub fn fits(&self, data_type: DataType, num_elements: usize) -> bool {
        let components = num_elements * data_type.extent as usize;
        match self {
            Self::Strings(s) => data_type.pod.is_string() && s.len() == components,
            Self::Pod(b) => {
                !data_type.pod.is_string() && b.len() == components * data_type.pod.num_bytes()
            }
        }
    }
}

/// One array sample: payload plus shape.
///
/// `dimensions` count elements, not components: four `Vec3f` points are
/// 48 bytes with dimensions `[4]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArraySample {
    pub data: SampleData,
    pub dimensions: Dimensions,
}

impl ArraySample {
    /// Zero-length sample with `[0]` dimensions.
    pub fn empty(pod: PlainOldDataType) -> Self {
        Self {
            data: SampleData::empty(pod),
            dimensions: Dimensions::empty(),
        }
    }

    /// Build from typed values grouped `extent` components per element.
    pub fn from_values<T: AlembicPod>(values: &[T], extent: u8) -> Self {
        let extent = extent.max(1) as usize;
        Self {
            data: SampleData::from_values(values),
            dimensions: Dimensions::d1(values.len() / extent),
        }
    }

    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        let data = SampleData::from_strings(values);
        let n = data.num_components(PlainOldDataType::String);
        Self {
            data,
            dimensions: Dimensions::d1(n),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dimensions.num_points()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values<T: AlembicPod>(&self) -> Option<Vec<T>> {
        self.data.values()
    }
}
