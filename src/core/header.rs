//! Headers for objects and properties.

use serde::{Deserialize, Serialize};

use super::MetaData;
use crate::util::DataType;

/// Header of an object in the hierarchy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectHeader {
    /// Name of this object (not full path).
    pub name: String,
    /// Full path from the root (e.g. "/xform/mesh").
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data: MetaData::new(),
        }
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn schema(&self) -> Option<&str> {
        self.meta_data.schema()
    }
}

/// Kind of property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Container for other properties.
    #[default]
    Compound,
    /// Single fixed-shape value per sample.
    Scalar,
    /// Variable-length array per sample.
    Array,
}

impl PropertyType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Scalar => "scalar",
            Self::Array => "array",
        }
    }
}

/// Header of a property.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    /// POD and extent. Unknown for compounds.
    pub data_type: DataType,
    /// Index into the archive's time sampling table (0 = identity).
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
}

impl PropertyHeader {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar,
            data_type,
            ..Default::default()
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Array,
            data_type,
            ..Default::default()
        }
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Compound,
            data_type: DataType::UNKNOWN,
            ..Default::default()
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }

    /// Same property kind and same data type.
    pub fn same_shape(&self, other: &PropertyHeader) -> bool {
        self.property_type == other.property_type && self.data_type == other.data_type
    }
}
