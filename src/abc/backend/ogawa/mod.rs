//! Ogawa backend, the Alembic container format.
//!
//! Reading builds the object and property tree from the file's groups and
//! leaves every sample in the file: scalar and array properties carry a
//! [`StoredSamples`] handle and decode a sample only when it is asked for.
//! Writing goes through [`OgawaWriter`], which appends sample data while
//! the tree is still being built.
//!
//! ```text
//! root group
//! ├── data   archive version (i32)
//! ├── data   library version (i32)
//! ├── group  top object
//! ├── data   archive metadata
//! ├── data   time samplings
//! └── data   indexed metadata
//! ```

mod format;
mod read_util;
mod reader;
mod samples;
mod stream;
mod writer;

use std::path::Path;
use std::sync::Arc;

use super::{ArchiveBackend, ArchiveWriter, BackendKind};
use crate::abc::{ArchiveData, ArrayData, CompoundData, ObjectData, PropertyData, ScalarData};
use crate::core::{MetaData, PropertyHeader, PropertyType, TimeSampling};
use crate::util::{Error, Result};

use format::*;
use read_util::{read_indexed_metadata, read_object_headers, read_property_headers, read_time_samplings};
use reader::{IData, IGroup, IStreams};
use samples::SampleRange;

pub use format::OGAWA_MAGIC;
pub use samples::StoredSamples;
pub use writer::OgawaWriter;

/// Deepest object or compound nesting accepted from a file.
const MAX_DEPTH: usize = 256;

/// Alembic Ogawa storage. The default backend.
#[derive(Clone, Copy, Debug)]
pub struct OgawaBackend {
    /// Map the file instead of reading through a shared handle.
    pub use_mmap: bool,
}

impl Default for OgawaBackend {
    fn default() -> Self {
        Self { use_mmap: cfg!(feature = "mmap") }
    }
}

impl ArchiveBackend for OgawaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ogawa
    }

    fn read(&self, path: &Path) -> Result<ArchiveData> {
        let streams = Arc::new(IStreams::open(path, self.use_mmap)?);
        if !streams.is_frozen() {
            return Err(Error::invalid("archive was not finalized"));
        }
        if streams.version() != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(streams.version()));
        }

        let root = IGroup::new(streams.clone(), streams.root_pos()?)?;
        if root.num_children() < ROOT_CHILD_COUNT {
            return Err(Error::invalid(format!(
                "root group has {} children, expected {}",
                root.num_children(),
                ROOT_CHILD_COUNT
            )));
        }

        let version = read_i32(&root.data(0)?)?;
        if !(OGAWA_FILE_VERSION..=MAX_OGAWA_FILE_VERSION).contains(&version) {
            return Err(Error::invalid(format!("unsupported archive version {}", version)));
        }
        let library = read_i32(&root.data(1)?)?;
        if library < MIN_LIBRARY_VERSION {
            return Err(Error::invalid(format!("archive written by library version {}", library)));
        }

        let meta_data = MetaData::parse(&String::from_utf8(root.data(3)?.read_all()?)?);
        let (mut time_samplings, mut max_samples) = read_time_samplings(&root.data(4)?.read_all()?)?;
        if time_samplings.is_empty() {
            time_samplings.push(TimeSampling::IDENTITY);
            max_samples.push(0);
        }
        let meta_table = read_indexed_metadata(&root.data(5)?.read_all()?)?;

        let mut top = ObjectData::root();
        read_object(&root.group(2)?, &mut top, &meta_table, 0)?;

        tracing::trace!(
            "{}: ogawa v{}, library {}, {} time samplings",
            path.display(),
            version,
            library,
            time_samplings.len()
        );
        Ok(ArchiveData { meta_data, time_samplings, max_samples, root: top })
    }

    fn write(&self, path: &Path, archive: &ArchiveData, compression: i32) -> Result<()> {
        Box::new(OgawaWriter::create(path)?).finish(archive, compression)
    }

    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>> {
        Ok(Box::new(OgawaWriter::create(path)?))
    }
}

fn read_i32(data: &IData) -> Result<i32> {
    let bytes = data.read_all()?;
    let raw: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::invalid(format!("expected a 4-byte version, got {} bytes", bytes.len())))?;
    Ok(i32::from_le_bytes(raw))
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid(format!("nesting deeper than {}", MAX_DEPTH)));
    }
    Ok(())
}

/// Fill `obj` from its group: properties, then children, then headers.
fn read_object(group: &IGroup, obj: &mut ObjectData, meta_table: &[MetaData], depth: usize) -> Result<()> {
    check_depth(depth)?;
    let n = group.num_children();
    if n == 0 {
        return Ok(());
    }
    if n < 2 {
        return Err(Error::invalid(format!("object {} has no header block", obj.full_name())));
    }

    let headers = read_object_headers(&group.data(n - 1)?.read_all()?, meta_table)?;
    if headers.len() as u64 != n - 2 {
        return Err(Error::invalid(format!(
            "object {}: {} child headers for {} child groups",
            obj.full_name(),
            headers.len(),
            n - 2
        )));
    }

    obj.properties = read_compound(&group.group(0)?, obj.properties.header.clone(), meta_table, depth)?;
    for (i, header) in headers.into_iter().enumerate() {
        let child = obj.add_child(&header.name, header.meta_data);
        read_object(&group.group(i as u64 + 1)?, child, meta_table, depth + 1)?;
    }
    Ok(())
}

fn read_compound(
    group: &IGroup,
    header: PropertyHeader,
    meta_table: &[MetaData],
    depth: usize,
) -> Result<CompoundData> {
    check_depth(depth)?;
    let mut compound = CompoundData::new(header);
    let n = group.num_children();
    if n == 0 {
        return Ok(compound);
    }

    let headers = read_property_headers(&group.data(n - 1)?.read_all()?, meta_table)?;
    if headers.len() as u64 != n - 1 {
        return Err(Error::invalid(format!(
            "compound {:?}: {} property headers for {} groups",
            compound.name(),
            headers.len(),
            n - 1
        )));
    }

    for (i, parsed) in headers.into_iter().enumerate() {
        let child = group.group(i as u64)?;
        let range = SampleRange {
            num_samples: parsed.num_samples,
            first_changed: parsed.first_changed,
            last_changed: parsed.last_changed,
            homogenous: parsed.homogenous,
        };
        let prop = match parsed.header.property_type {
            PropertyType::Compound => {
                PropertyData::Compound(read_compound(&child, parsed.header, meta_table, depth + 1)?)
            }
            PropertyType::Scalar => {
                check_sample_groups(&parsed.header, &child, range, 1)?;
                PropertyData::Scalar(ScalarData {
                    header: parsed.header,
                    samples: Vec::new(),
                    stored: Some(StoredSamples::in_file(
                        child.streams().clone(),
                        child.pos(),
                        child.child_offsets(),
                        range,
                    )),
                })
            }
            PropertyType::Array => {
                check_sample_groups(&parsed.header, &child, range, 2)?;
                PropertyData::Array(ArrayData {
                    header: parsed.header,
                    samples: Vec::new(),
                    stored: Some(StoredSamples::in_file(
                        child.streams().clone(),
                        child.pos(),
                        child.child_offsets(),
                        range,
                    )),
                })
            }
        };
        compound.children.push(prop);
    }
    Ok(compound)
}

/// A property group needs one entry (scalar) or two (array) per stored
/// sample.
fn check_sample_groups(header: &PropertyHeader, group: &IGroup, range: SampleRange, per_sample: u64) -> Result<()> {
    let (n, first, last) = (range.num_samples, range.first_changed, range.last_changed);
    if n > 0 && last >= n && !(first == 0 && last == 0) {
        return Err(Error::invalid(format!(
            "property {}: last changed sample {} of {}",
            header.name, last, n
        )));
    }
    let stored = match n {
        0 => 0,
        _ if last == 0 || last < first => 1,
        _ => u64::from(last - first) + 2,
    };
    if group.num_children() < stored * per_sample {
        return Err(Error::invalid(format!(
            "property {}: {} sample blocks, expected {}",
            header.name,
            group.num_children(),
            stored * per_sample
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArraySample, SampleData};
    use crate::util::{DataType, Dimensions};

    fn scene() -> ArchiveData {
        let mut archive = ArchiveData {
            meta_data: MetaData::new().with(MetaData::APP_NAME_KEY, "unit"),
            time_samplings: vec![TimeSampling::IDENTITY, TimeSampling::uniform(1.0 / 24.0, 1.0)],
            ..Default::default()
        };
        let xform = archive
            .root
            .add_child("xform", MetaData::new().with("schema", "AbcGeom_Xform_v3"));
        let mesh = xform.add_child("mesh", MetaData::new().with("schema", "AbcGeom_PolyMesh_v1"));

        let geom = mesh.properties.add_compound(
            PropertyHeader::compound(".geom").with_meta_data(MetaData::new().with("schema", "AbcGeom_PolyMesh_v1")),
        );
        let p = geom.add_array(PropertyHeader::array("P", DataType::VEC3F).with_time_sampling(1));
        p.push(ArraySample::from_values(&[0.0f32, 0.0, 0.0], 3));
        p.push(ArraySample::from_values(&[0.0f32, 0.0, 0.0], 3));
        p.push(ArraySample::from_values(&[1.0f32, 0.0, 0.0, 2.0, 0.0, 0.0], 3));
        p.push(ArraySample::empty(DataType::VEC3F.pod));
        p.push(ArraySample::empty(DataType::VEC3F.pod));

        let names = geom.add_array(PropertyHeader::array("names", DataType::STRING).with_time_sampling(1));
        for _ in 0..5 {
            names.push(ArraySample::from_strings(["a", "", "b"]));
        }

        let visible = mesh
            .properties
            .add_scalar(PropertyHeader::scalar("visible", DataType::UINT8).with_time_sampling(1));
        for v in [1u8, 1, 0, 0, 1] {
            visible.push(SampleData::from_values(&[v]));
        }
        let label = mesh.properties.add_scalar(PropertyHeader::scalar("label", DataType::STRING));
        label.push(SampleData::from_strings(["shot"]));

        archive.update_max_samples();
        archive
    }

    #[test]
    fn test_read_leaves_samples_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.abc");
        let original = scene();

        for use_mmap in [false, true] {
            let backend = OgawaBackend { use_mmap };
            backend.write(&path, &original, -1).unwrap();
            let back = backend.read(&path).unwrap();

            assert_eq!(back.meta_data.get(MetaData::APP_NAME_KEY), Some("unit"));
            assert!(back.meta_data.get(MetaData::ALEMBIC_VERSION_KEY).is_some_and(|v| v.starts_with("Alembic 1.8.10")));
            assert_eq!(back.max_samples, original.max_samples);
            assert_eq!(back.time_samplings.len(), 2);
            assert!(back.time_samplings[0].is_identity());
            assert!(back.time_samplings[1].is_equivalent(&original.time_samplings[1]));

            let mesh = back.root.child("xform").and_then(|x| x.child("mesh")).unwrap();
            assert_eq!(mesh.full_name(), "/xform/mesh");
            assert_eq!(mesh.header.meta_data.schema(), Some("AbcGeom_PolyMesh_v1"));
            let geom = match mesh.properties.get(".geom") {
                Some(PropertyData::Compound(c)) => c,
                other => panic!("unexpected {:?}", other),
            };
            let p = match geom.get("P") {
                Some(PropertyData::Array(a)) => a,
                other => panic!("unexpected {:?}", other),
            };
            assert!(p.samples.is_empty());
            assert_eq!(p.num_samples(), 5);
            assert_eq!(p.sample(2).unwrap().values::<f32>().unwrap(), vec![1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
            assert_eq!(p.sample(4).unwrap().dimensions, Dimensions::empty());
            assert_eq!(p.sample(99).unwrap(), p.sample(4).unwrap());

            let materialized = back.materialized().unwrap();
            assert_eq!(materialized.root, original.root);
        }
    }

    #[test]
    fn test_constant_property_is_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.abc");
        OgawaBackend::default().write(&path, &scene(), -1).unwrap();
        let back = OgawaBackend::default().read(&path).unwrap();

        let mesh = back.root.child("xform").and_then(|x| x.child("mesh")).unwrap();
        let geom = match mesh.properties.get(".geom") {
            Some(PropertyData::Compound(c)) => c,
            other => panic!("unexpected {:?}", other),
        };
        let names = match geom.get("names") {
            Some(PropertyData::Array(a)) => a,
            other => panic!("unexpected {:?}", other),
        };
        assert!(names.stored.as_ref().is_some_and(StoredSamples::is_constant));
        assert!(names.is_constant().unwrap());
        assert_eq!(names.sample(3).unwrap().data.strings().unwrap(), ["a", "", "b"]);

        let visible = match mesh.properties.get("visible") {
            Some(PropertyData::Scalar(s)) => s,
            other => panic!("unexpected {:?}", other),
        };
        assert!(!visible.is_constant().unwrap());
        let got: Vec<u8> = (0..5).map(|i| visible.sample(i).unwrap().values::<u8>().unwrap()[0]).collect();
        assert_eq!(got, vec![1, 1, 0, 0, 1]);
    }

    #[test]
    fn test_unfinished_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.abc");
        drop(OgawaWriter::create(&path).unwrap());

        let err = OgawaBackend::default().read(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(_)), "{:?}", err);
    }

    #[test]
    fn test_truncated_sample_group_is_rejected() {
        let header = PropertyHeader::scalar("s", DataType::FLOAT32);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group.abc");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(OGAWA_MAGIC);
        bytes.push(FROZEN_FLAG);
        bytes.extend_from_slice(&CURRENT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&16u64.to_le_bytes());
        // group with one child for a property that claims 4 stored samples
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&EMPTY_DATA.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let streams = Arc::new(IStreams::open(&path, false).unwrap());
        let group = IGroup::new(streams, 16).unwrap();
        let range = SampleRange { num_samples: 4, first_changed: 1, last_changed: 3, homogenous: true };
        assert!(check_sample_groups(&header, &group, range, 1).is_err());
        let constant = SampleRange { num_samples: 4, ..Default::default() };
        assert!(check_sample_groups(&header, &group, constant, 1).is_ok());
    }
}
