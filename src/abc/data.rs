//! Archive tree.
//!
//! Readers get this tree back from a backend and wrap it in the borrowing
//! `I*` types. Properties read from an Ogawa file keep their samples in the
//! file and decode them on access. Writers build the tree as they go; a
//! streaming backend takes the samples out of each finished compound.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::backend::StoredSamples;

use crate::core::{
    ArraySample, MetaData, ObjectHeader, PropertyHeader, PropertyType, SampleData, TimeSampling,
    IDENTITY_TIME_SAMPLING,
};
use crate::util::{Error, Result};

/// Complete archive contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveData {
    pub meta_data: MetaData,
    /// Index 0 is always identity.
    pub time_samplings: Vec<TimeSampling>,
    /// Largest sample count written against each time sampling.
    pub max_samples: Vec<usize>,
    pub root: ObjectData,
}

impl ArchiveData {
    /// Time sampling at `index`, identity when out of range.
    pub fn time_sampling(&self, index: u32) -> &TimeSampling {
        self.time_samplings
            .get(index as usize)
            .unwrap_or(&IDENTITY_TIME_SAMPLING)
    }

    /// Check that the time sampling table is usable and that every property
    /// refers to an existing entry.
    pub fn validate(&self) -> Result<()> {
        if self.time_samplings.is_empty() {
            return Err(Error::invalid("archive has no time samplings"));
        }
        let count = self.time_samplings.len();
        check_object(&self.root, count)
    }

    /// Copy of the archive with every stored sample decoded into memory.
    pub fn materialized(&self) -> Result<ArchiveData> {
        let mut copy = self.clone();
        materialize_object(&mut copy.root)?;
        Ok(copy)
    }

    /// Recompute `max_samples` from the property tree.
    pub fn update_max_samples(&mut self) {
        let mut max = vec![0usize; self.time_samplings.len()];
        collect_max_samples(&self.root, &mut max);
        self.max_samples = max;
    }
}

fn check_object(obj: &ObjectData, ts_count: usize) -> Result<()> {
    check_compound(&obj.properties, &obj.header.full_name, ts_count)?;
    obj.children.iter().try_for_each(|c| check_object(c, ts_count))
}

fn check_compound(compound: &CompoundData, path: &str, ts_count: usize) -> Result<()> {
    for prop in &compound.children {
        let header = prop.header();
        if header.time_sampling_index as usize >= ts_count {
            return Err(Error::invalid(format!(
                "property {}/{} uses time sampling {} of {}",
                path, header.name, header.time_sampling_index, ts_count
            )));
        }
        if let PropertyData::Compound(c) = prop {
            check_compound(c, path, ts_count)?;
        }
    }
    Ok(())
}

fn materialize_object(obj: &mut ObjectData) -> Result<()> {
    fn walk(compound: &mut CompoundData) -> Result<()> {
        for prop in &mut compound.children {
            match prop {
                PropertyData::Compound(c) => walk(c)?,
                PropertyData::Scalar(s) => {
                    if s.stored.is_some() {
                        let samples = s.load()?.into_owned();
                        s.samples = samples;
                        s.stored = None;
                    }
                }
                PropertyData::Array(a) => {
                    if a.stored.is_some() {
                        let samples = a.load()?.into_owned();
                        a.samples = samples;
                        a.stored = None;
                    }
                }
            }
        }
        Ok(())
    }
    walk(&mut obj.properties)?;
    obj.children.iter_mut().try_for_each(materialize_object)
}

fn collect_max_samples(obj: &ObjectData, max: &mut [usize]) {
    fn walk(compound: &CompoundData, max: &mut [usize]) {
        for prop in &compound.children {
            match prop {
                PropertyData::Compound(c) => walk(c, max),
                other => {
                    let idx = other.header().time_sampling_index as usize;
                    if let Some(m) = max.get_mut(idx) {
                        *m = (*m).max(other.num_samples());
                    }
                }
            }
        }
    }
    walk(&obj.properties, max);
    for child in &obj.children {
        collect_max_samples(child, max);
    }
}

/// Object node: header, top compound and ordered children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub header: ObjectHeader,
    pub properties: CompoundData,
    pub children: Vec<ObjectData>,
}

impl Default for ObjectData {
    fn default() -> Self {
        Self::root()
    }
}

impl ObjectData {
    /// Archive root (`ABC`, full name `/`).
    pub fn root() -> Self {
        Self {
            header: ObjectHeader::new("ABC", "/"),
            properties: CompoundData::new(PropertyHeader::compound("")),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn full_name(&self) -> &str {
        &self.header.full_name
    }

    pub fn child(&self, name: &str) -> Option<&ObjectData> {
        self.children.iter().find(|c| c.header.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut ObjectData> {
        self.children.iter_mut().find(|c| c.header.name == name)
    }

    /// Append a child object and return it. The full name is derived from
    /// this object's path.
    pub fn add_child(&mut self, name: &str, meta_data: MetaData) -> &mut ObjectData {
        let full_name = if self.header.full_name == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.header.full_name, name)
        };
        self.children.push(ObjectData {
            header: ObjectHeader::new(name, full_name).with_meta_data(meta_data),
            properties: CompoundData::new(PropertyHeader::compound("")),
            children: Vec::new(),
        });
        let last = self.children.len() - 1;
        &mut self.children[last]
    }
}

/// Compound property: named, ordered children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompoundData {
    pub header: PropertyHeader,
    pub children: Vec<PropertyData>,
}

impl CompoundData {
    pub fn new(header: PropertyHeader) -> Self {
        Self { header, children: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn get(&self, name: &str) -> Option<&PropertyData> {
        self.children.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertyData> {
        self.children.iter_mut().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Append a property built elsewhere.
    pub fn add(&mut self, prop: PropertyData) -> &mut PropertyData {
        self.children.push(prop);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn add_compound(&mut self, header: PropertyHeader) -> &mut CompoundData {
        match self.add(PropertyData::Compound(CompoundData::new(header))) {
            PropertyData::Compound(c) => c,
            _ => unreachable!("compound was just pushed"),
        }
    }

    pub fn add_scalar(&mut self, header: PropertyHeader) -> &mut ScalarData {
        match self.add(PropertyData::Scalar(ScalarData::new(header))) {
            PropertyData::Scalar(s) => s,
            _ => unreachable!("scalar was just pushed"),
        }
    }

    pub fn add_array(&mut self, header: PropertyHeader) -> &mut ArrayData {
        match self.add(PropertyData::Array(ArrayData::new(header))) {
            PropertyData::Array(a) => a,
            _ => unreachable!("array was just pushed"),
        }
    }

    pub fn compound_mut(&mut self, name: &str) -> Option<&mut CompoundData> {
        match self.get_mut(name) {
            Some(PropertyData::Compound(c)) => Some(c),
            _ => None,
        }
    }
}

/// Scalar property with one [`SampleData`] per sample.
///
/// When `stored` is set the samples live in an archive file and `samples`
/// is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarData {
    pub header: PropertyHeader,
    pub samples: Vec<SampleData>,
    #[serde(skip)]
    pub stored: Option<StoredSamples>,
}

impl ScalarData {
    pub fn new(header: PropertyHeader) -> Self {
        Self { header, samples: Vec::new(), stored: None }
    }

    pub fn push(&mut self, sample: SampleData) {
        self.samples.push(sample);
    }

    pub fn num_samples(&self) -> usize {
        self.stored.as_ref().map_or(self.samples.len(), StoredSamples::num_samples)
    }

    /// Sample at `index`. Indices past the end read the last sample.
    pub fn sample(&self, index: usize) -> Result<SampleData> {
        let count = self.num_samples();
        if count == 0 {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        let index = index.min(count - 1);
        match &self.stored {
            Some(stored) => stored.read_scalar(self.header.data_type, index),
            None => Ok(self.samples[index].clone()),
        }
    }

    /// All samples, decoded from the file when stored there.
    pub fn load(&self) -> Result<Cow<'_, [SampleData]>> {
        match &self.stored {
            Some(stored) => (0..stored.num_samples())
                .map(|i| stored.read_scalar(self.header.data_type, i))
                .collect::<Result<Vec<_>>>()
                .map(Cow::Owned),
            None => Ok(Cow::Borrowed(&self.samples)),
        }
    }

    pub fn is_constant(&self) -> Result<bool> {
        match &self.stored {
            Some(stored) if stored.is_constant() => Ok(true),
            _ => Ok(self.load()?.windows(2).all(|w| w[0] == w[1])),
        }
    }
}

/// Array property with one [`ArraySample`] per sample.
///
/// Same storage rules as [`ScalarData`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayData {
    pub header: PropertyHeader,
    pub samples: Vec<ArraySample>,
    #[serde(skip)]
    pub stored: Option<StoredSamples>,
}

impl ArrayData {
    pub fn new(header: PropertyHeader) -> Self {
        Self { header, samples: Vec::new(), stored: None }
    }

    pub fn push(&mut self, sample: ArraySample) {
        self.samples.push(sample);
    }

    pub fn num_samples(&self) -> usize {
        self.stored.as_ref().map_or(self.samples.len(), StoredSamples::num_samples)
    }

    /// Sample at `index`. Indices past the end read the last sample.
    pub fn sample(&self, index: usize) -> Result<ArraySample> {
        let count = self.num_samples();
        if count == 0 {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        let index = index.min(count - 1);
        match &self.stored {
            Some(stored) => stored.read_array(self.header.data_type, index),
            None => Ok(self.samples[index].clone()),
        }
    }

    pub fn load(&self) -> Result<Cow<'_, [ArraySample]>> {
        match &self.stored {
            Some(stored) => (0..stored.num_samples())
                .map(|i| stored.read_array(self.header.data_type, i))
                .collect::<Result<Vec<_>>>()
                .map(Cow::Owned),
            None => Ok(Cow::Borrowed(&self.samples)),
        }
    }

    pub fn is_constant(&self) -> Result<bool> {
        match &self.stored {
            Some(stored) if stored.is_constant() => Ok(true),
            _ => Ok(self.load()?.windows(2).all(|w| w[0] == w[1])),
        }
    }
}

/// Any property node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyData {
    Compound(CompoundData),
    Scalar(ScalarData),
    Array(ArrayData),
}

impl PropertyData {
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Compound(c) => &c.header,
            Self::Scalar(s) => &s.header,
            Self::Array(a) => &a.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Compound(_) => PropertyType::Compound,
            Self::Scalar(_) => PropertyType::Scalar,
            Self::Array(_) => PropertyType::Array,
        }
    }

    /// Sample count (0 for compounds).
    pub fn num_samples(&self) -> usize {
        match self {
            Self::Compound(_) => 0,
            Self::Scalar(s) => s.num_samples(),
            Self::Array(a) => a.num_samples(),
        }
    }
}
