//! Archive access API.
//!
//! - [`IArchive`] / [`OArchive`] - Archive (file) access
//! - [`IObject`] - Hierarchical scene objects
//! - [`ICompoundProperty`] - Property containers
//! - [`IScalarProperty`] / [`IArrayProperty`] - Sampled properties
//!
//! Writers build an [`ObjectData`] tree under [`OArchive::root_mut`]. The
//! archive's [`ArchiveWriter`] may take samples out of finished compounds
//! while the tree grows; the rest is written on [`OArchive::close`].
//!
//! ## Example
//!
//! ```ignore
//! use abc_stitch::abc::IArchive;
//!
//! let archive = IArchive::open("shot_a.abc")?;
//! for child in archive.root().children() {
//!     println!("{}", child.full_name());
//! }
//! ```

pub mod backend;
mod data;

use std::path::{Path, PathBuf};

pub use backend::{ArchiveBackend, ArchiveWriter, BackendKind};
pub use data::{ArchiveData, ArrayData, CompoundData, ObjectData, PropertyData, ScalarData};

use crate::core::{
    ArraySample, MetaData, ObjectHeader, PropertyHeader, PropertyType, SampleData, TimeSampling,
};
use crate::util::{AlembicPod, DataType, Error, Result};

// ============================================================================
// Archives
// ============================================================================

/// Input archive.
#[derive(Debug)]
pub struct IArchive {
    name: String,
    backend: BackendKind,
    data: ArchiveData,
}

impl IArchive {
    /// Open an archive, detecting its backend.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (backend, data) = backend::read_archive(path)?;
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            backend,
            data,
        })
    }

    /// Wrap an in-memory archive.
    pub fn from_data(name: impl Into<String>, data: ArchiveData) -> Result<Self> {
        data.validate()?;
        Ok(Self {
            name: name.into(),
            backend: BackendKind::default(),
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.data.meta_data
    }

    /// Application that wrote the archive, if recorded.
    pub fn app_name(&self) -> Option<&str> {
        self.data.meta_data.get(MetaData::APP_NAME_KEY)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.data.time_samplings.len()
    }

    pub fn time_sampling(&self, index: usize) -> Option<&TimeSampling> {
        self.data.time_samplings.get(index)
    }

    pub fn time_samplings(&self) -> &[TimeSampling] {
        &self.data.time_samplings
    }

    /// Largest sample count written against time sampling `index`.
    pub fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<usize> {
        self.data.max_samples.get(index).copied()
    }

    pub fn root(&self) -> IObject<'_> {
        IObject {
            archive: &self.data,
            data: &self.data.root,
        }
    }

    /// Find an object by full path ("/a/b").
    pub fn find_object(&self, path: &str) -> Option<IObject<'_>> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(self.root(), |obj, part| obj.child_by_name(part))
    }

    pub fn data(&self) -> &ArchiveData {
        &self.data
    }
}

/// Output time sampling table. Index 0 is identity; equivalent samplings
/// share one index.
#[derive(Clone, Debug)]
pub struct TimeSamplingTable {
    samplings: Vec<TimeSampling>,
}

impl Default for TimeSamplingTable {
    fn default() -> Self {
        Self { samplings: vec![TimeSampling::IDENTITY] }
    }
}

impl TimeSamplingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a time sampling and return its index.
    pub fn add(&mut self, ts: TimeSampling) -> u32 {
        if let Some(i) = self.samplings.iter().position(|s| s.is_equivalent(&ts)) {
            return i as u32;
        }
        self.samplings.push(ts);
        (self.samplings.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&TimeSampling> {
        self.samplings.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.samplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplings.is_empty()
    }

    pub fn as_slice(&self) -> &[TimeSampling] {
        &self.samplings
    }
}

/// Output archive.
pub struct OArchive {
    path: PathBuf,
    backend: BackendKind,
    writer: Box<dyn ArchiveWriter>,
    compression: i32,
    meta_data: MetaData,
    time_samplings: TimeSamplingTable,
    root: ObjectData,
}

impl OArchive {
    /// Create an output archive at `path`. The file is created right away
    /// so that an unwritable destination fails before any work is done.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let backend = BackendKind::from_path(&path);
        Ok(Self {
            writer: backend.backend().create(&path)?,
            backend,
            path,
            compression: -1,
            meta_data: MetaData::new(),
            time_samplings: TimeSamplingTable::new(),
            root: ObjectData::root(),
        })
    }

    pub fn name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Switch backends. Only valid before anything was spilled.
    pub fn set_backend(&mut self, backend: BackendKind) -> Result<()> {
        if backend != self.backend {
            self.writer = backend.backend().create(&self.path)?;
            self.backend = backend;
        }
        Ok(())
    }

    /// Compression hint (-1 = none, 0-9 = zlib level).
    pub fn set_compression_hint(&mut self, hint: i32) {
        self.compression = hint.clamp(-1, 9);
    }

    pub fn compression_hint(&self) -> i32 {
        self.compression
    }

    pub fn meta_data_mut(&mut self) -> &mut MetaData {
        &mut self.meta_data
    }

    pub fn set_app_name(&mut self, name: &str) {
        self.meta_data.set(MetaData::APP_NAME_KEY, name);
    }

    pub fn set_description(&mut self, desc: &str) {
        self.meta_data.set(MetaData::DESCRIPTION_KEY, desc);
    }

    /// Add a time sampling and return its index.
    pub fn add_time_sampling(&mut self, ts: TimeSampling) -> u32 {
        self.time_samplings.add(ts)
    }

    pub fn time_samplings(&self) -> &TimeSamplingTable {
        &self.time_samplings
    }

    pub fn root_mut(&mut self) -> &mut ObjectData {
        &mut self.root
    }

    /// Time sampling table, root and writer at once, for code that
    /// registers samplings and spills compounds while building the tree.
    pub fn parts_mut(&mut self) -> (&mut TimeSamplingTable, &mut ObjectData, &mut dyn ArchiveWriter) {
        (&mut self.time_samplings, &mut self.root, self.writer.as_mut())
    }

    /// Finalize and write the archive.
    pub fn close(self) -> Result<()> {
        let mut data = ArchiveData {
            meta_data: self.meta_data,
            time_samplings: self.time_samplings.samplings,
            max_samples: Vec::new(),
            root: self.root,
        };
        data.update_max_samples();
        data.validate()?;
        tracing::debug!(
            "writing {} ({} backend, {} time samplings)",
            self.path.display(),
            self.backend.name(),
            data.time_samplings.len()
        );
        self.writer.finish(&data, self.compression)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Input object.
#[derive(Clone, Copy)]
pub struct IObject<'a> {
    archive: &'a ArchiveData,
    data: &'a ObjectData,
}

impl<'a> IObject<'a> {
    pub fn header(&self) -> &'a ObjectHeader {
        &self.data.header
    }

    pub fn name(&self) -> &'a str {
        &self.data.header.name
    }

    pub fn full_name(&self) -> &'a str {
        &self.data.header.full_name
    }

    pub fn meta_data(&self) -> &'a MetaData {
        &self.data.header.meta_data
    }

    pub fn is_root(&self) -> bool {
        self.data.header.full_name == "/"
    }

    pub fn num_children(&self) -> usize {
        self.data.children.len()
    }

    pub fn child(&self, index: usize) -> Option<IObject<'a>> {
        self.data.children.get(index).map(|data| self.wrap(data))
    }

    pub fn child_by_name(&self, name: &str) -> Option<IObject<'a>> {
        self.data.child(name).map(|data| self.wrap(data))
    }

    pub fn children(&self) -> impl Iterator<Item = IObject<'a>> + 'a {
        let archive = self.archive;
        self.data.children.iter().map(move |data| IObject { archive, data })
    }

    /// Top compound property.
    pub fn properties(&self) -> ICompoundProperty<'a> {
        ICompoundProperty {
            archive: self.archive,
            data: &self.data.properties,
        }
    }

    fn wrap(&self, data: &'a ObjectData) -> IObject<'a> {
        IObject { archive: self.archive, data }
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Any input property.
#[derive(Clone, Copy)]
pub enum IProperty<'a> {
    Compound(ICompoundProperty<'a>),
    Scalar(IScalarProperty<'a>),
    Array(IArrayProperty<'a>),
}

impl<'a> IProperty<'a> {
    fn new(archive: &'a ArchiveData, data: &'a PropertyData) -> Self {
        match data {
            PropertyData::Compound(data) => Self::Compound(ICompoundProperty { archive, data }),
            PropertyData::Scalar(data) => Self::Scalar(IScalarProperty { archive, data }),
            PropertyData::Array(data) => Self::Array(IArrayProperty { archive, data }),
        }
    }

    pub fn header(&self) -> &'a PropertyHeader {
        match self {
            Self::Compound(p) => p.header(),
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
        }
    }

    pub fn name(&self) -> &'a str {
        &self.header().name
    }

    pub fn property_type(&self) -> PropertyType {
        self.header().property_type
    }

    pub fn as_compound(&self) -> Option<ICompoundProperty<'a>> {
        match self {
            Self::Compound(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<IScalarProperty<'a>> {
        match self {
            Self::Scalar(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<IArrayProperty<'a>> {
        match self {
            Self::Array(p) => Some(*p),
            _ => None,
        }
    }

    /// Time sampling of a scalar or array property. Compounds have none.
    pub fn time_sampling(&self) -> Option<&'a TimeSampling> {
        match self {
            Self::Compound(_) => None,
            Self::Scalar(p) => Some(p.time_sampling()),
            Self::Array(p) => Some(p.time_sampling()),
        }
    }

    pub fn num_samples(&self) -> usize {
        match self {
            Self::Compound(_) => 0,
            Self::Scalar(p) => p.num_samples(),
            Self::Array(p) => p.num_samples(),
        }
    }
}

/// Input compound property.
#[derive(Clone, Copy)]
pub struct ICompoundProperty<'a> {
    archive: &'a ArchiveData,
    data: &'a CompoundData,
}

impl<'a> ICompoundProperty<'a> {
    pub fn header(&self) -> &'a PropertyHeader {
        &self.data.header
    }

    pub fn name(&self) -> &'a str {
        &self.data.header.name
    }

    pub fn num_properties(&self) -> usize {
        self.data.children.len()
    }

    pub fn property_headers(&self) -> impl Iterator<Item = &'a PropertyHeader> + 'a {
        self.data.children.iter().map(|p| p.header())
    }

    pub fn property_header(&self, name: &str) -> Option<&'a PropertyHeader> {
        self.data.get(name).map(|p| p.header())
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.data.contains(name)
    }

    pub fn property(&self, name: &str) -> Option<IProperty<'a>> {
        self.data.get(name).map(|p| IProperty::new(self.archive, p))
    }

    pub fn property_at(&self, index: usize) -> Option<IProperty<'a>> {
        self.data.children.get(index).map(|p| IProperty::new(self.archive, p))
    }

    pub fn properties(&self) -> impl Iterator<Item = IProperty<'a>> + 'a {
        let archive = self.archive;
        self.data.children.iter().map(move |p| IProperty::new(archive, p))
    }

    pub fn compound(&self, name: &str) -> Option<ICompoundProperty<'a>> {
        self.property(name).and_then(|p| p.as_compound())
    }

    pub fn scalar(&self, name: &str) -> Option<IScalarProperty<'a>> {
        self.property(name).and_then(|p| p.as_scalar())
    }

    pub fn array(&self, name: &str) -> Option<IArrayProperty<'a>> {
        self.property(name).and_then(|p| p.as_array())
    }
}

/// Input scalar property.
#[derive(Clone, Copy)]
pub struct IScalarProperty<'a> {
    archive: &'a ArchiveData,
    data: &'a ScalarData,
}

impl<'a> IScalarProperty<'a> {
    pub fn header(&self) -> &'a PropertyHeader {
        &self.data.header
    }

    pub fn name(&self) -> &'a str {
        &self.data.header.name
    }

    pub fn data_type(&self) -> DataType {
        self.data.header.data_type
    }

    pub fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    /// Every sample equals the first.
    pub fn is_constant(&self) -> Result<bool> {
        self.data.is_constant()
    }

    pub fn time_sampling(&self) -> &'a TimeSampling {
        self.archive.time_sampling(self.data.header.time_sampling_index)
    }

    /// Sample at `index`. Indices past the end read the last sample.
    pub fn sample(&self, index: usize) -> Result<SampleData> {
        self.data.sample(index)
    }

    /// Sample at `index` as typed values.
    pub fn values<T: AlembicPod>(&self, index: usize) -> Result<Vec<T>> {
        let sample = self.sample(index)?;
        sample.values().ok_or_else(|| type_mismatch::<T>(self.data_type()))
    }
}

/// Input array property.
#[derive(Clone, Copy)]
pub struct IArrayProperty<'a> {
    archive: &'a ArchiveData,
    data: &'a ArrayData,
}

impl<'a> IArrayProperty<'a> {
    pub fn header(&self) -> &'a PropertyHeader {
        &self.data.header
    }

    pub fn name(&self) -> &'a str {
        &self.data.header.name
    }

    pub fn data_type(&self) -> DataType {
        self.data.header.data_type
    }

    pub fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    /// Every sample equals the first.
    pub fn is_constant(&self) -> Result<bool> {
        self.data.is_constant()
    }

    pub fn time_sampling(&self) -> &'a TimeSampling {
        self.archive.time_sampling(self.data.header.time_sampling_index)
    }

    /// Sample at `index`. Indices past the end read the last sample.
    pub fn sample(&self, index: usize) -> Result<ArraySample> {
        self.data.sample(index)
    }

    pub fn values<T: AlembicPod>(&self, index: usize) -> Result<Vec<T>> {
        let sample = self.sample(index)?;
        sample.values().ok_or_else(|| type_mismatch::<T>(self.data_type()))
    }
}

fn type_mismatch<T: AlembicPod>(actual: DataType) -> Error {
    Error::TypeMismatch {
        expected: T::POD_TYPE.name().to_string(),
        actual: actual.to_string(),
    }
}
