//! Incremental Ogawa writer.
//!
//! Sample data is written as soon as a property is handed to
//! [`ArchiveWriter::spill`]; groups for objects and compounds, the header
//! tables and the archive root follow in [`ArchiveWriter::finish`].
//! Identical sample payloads are stored once.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::format::*;
use super::samples::{encode_payload, SampleRange, StoredSamples};
use super::stream::OStream;
use crate::abc::backend::ArchiveWriter;
use crate::abc::{ArchiveData, ArrayData, CompoundData, ObjectData, PropertyData, ScalarData};
use crate::core::{ArraySample, MetaData, PropertyHeader, PropertyType, SampleData, TimeSampling};
use crate::util::{Dimensions, PlainOldDataType, Result};

/// Content key of a sample payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SampleKey {
    digest: u128,
    len: usize,
    strings: bool,
}

impl SampleKey {
    fn new(payload: &[u8], pod: PlainOldDataType) -> Result<Self> {
        let seed = match pod {
            PlainOldDataType::String => 1,
            PlainOldDataType::Wstring => 4,
            other => other.num_bytes() as u32,
        };
        Ok(Self {
            digest: digest(payload, seed)?,
            len: payload.len(),
            strings: pod.is_string(),
        })
    }
}

fn digest(bytes: &[u8], seed: u32) -> Result<u128> {
    Ok(murmur3::murmur3_x64_128(&mut Cursor::new(bytes), seed)?)
}

fn mix(a: u128, b: u128) -> Result<u128> {
    let mut buf = [0u8; 32];
    buf[..16].copy_from_slice(&a.to_le_bytes());
    buf[16..].copy_from_slice(&b.to_le_bytes());
    digest(&buf, 0)
}

/// `value` in 1, 2 or 4 bytes.
fn write_with_hint(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

fn library_version_string() -> String {
    format!(
        "Alembic {}.{}.{} (built {})",
        LIBRARY_VERSION / 10000,
        LIBRARY_VERSION / 100 % 100,
        LIBRARY_VERSION % 100,
        env!("ABC_STITCH_BUILD_DATE")
    )
}

/// Changed-sample tracking for one property while its samples are written.
struct SampleState {
    children: Vec<u64>,
    range: SampleRange,
    prev: Option<(SampleKey, Vec<u64>)>,
    prev_points: Option<usize>,
    hash: u128,
}

impl SampleState {
    fn new(num_samples: usize) -> Self {
        Self {
            children: Vec::new(),
            range: SampleRange {
                num_samples: num_samples as u32,
                homogenous: true,
                ..Default::default()
            },
            prev: None,
            prev_points: None,
            hash: 0,
        }
    }

    fn is_new(&self, key: &SampleKey) -> bool {
        self.prev.as_ref().map_or(true, |(k, _)| k != key)
    }

    /// Record sample `index`, already written at `offsets`.
    fn push(&mut self, index: u32, key: SampleKey, offsets: &[u64]) {
        if index > 0 && self.range.first_changed != 0 {
            if let Some((_, prev)) = &self.prev {
                for _ in (self.range.last_changed + 1)..index {
                    self.children.extend_from_slice(prev);
                }
            }
        }
        self.children.extend_from_slice(offsets);
        self.prev = Some((key, offsets.to_vec()));
        if index != 0 {
            if self.range.first_changed == 0 {
                self.range.first_changed = index;
            }
            self.range.last_changed = index;
        }
    }
}

/// Writes an Ogawa archive as the tree is built.
pub struct OgawaWriter {
    path: PathBuf,
    stream: OStream,
    written: HashMap<SampleKey, u64>,
    meta_data: Vec<String>,
    meta_index: HashMap<String, u8>,
}

impl OgawaWriter {
    /// Create the file and write a header that is not yet frozen.
    pub fn create(path: &Path) -> Result<Self> {
        let mut stream = OStream::create(path)?;
        stream.write_bytes(OGAWA_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_bytes(&CURRENT_VERSION.to_be_bytes())?;
        stream.write_u64(0)?;
        Ok(Self {
            path: path.to_path_buf(),
            stream,
            written: HashMap::new(),
            meta_data: vec![String::new()],
            meta_index: HashMap::new(),
        })
    }

    fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(data.len() as u64)?;
        self.stream.write_bytes(data)?;
        Ok(pos)
    }

    fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if children.is_empty() {
            return Ok(0);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(children.len() as u64)?;
        for &child in children {
            self.stream.write_u64(child)?;
        }
        Ok(pos)
    }

    /// Write `payload` behind its 16-byte key, reusing an identical block.
    fn write_keyed(&mut self, payload: &[u8], key: SampleKey) -> Result<u64> {
        if payload.is_empty() {
            return Ok(0);
        }
        if let Some(&pos) = self.written.get(&key) {
            return Ok(pos);
        }
        let pos = self.stream.pos();
        self.stream.write_u64((DATA_KEY_SIZE + payload.len()) as u64)?;
        self.stream.write_bytes(&key.digest.to_le_bytes())?;
        self.stream.write_bytes(payload)?;
        self.written.insert(key, pos);
        Ok(pos)
    }

    fn finish_property(&mut self, header: &PropertyHeader, state: SampleState) -> Result<StoredSamples> {
        let group = self.write_group(&state.children)?;
        let hash = mix(state.hash, digest(header.name.as_bytes(), 0)?)?;
        Ok(StoredSamples::written(group, state.range, hash))
    }

    fn write_scalar_samples(&mut self, header: &PropertyHeader, samples: &[SampleData]) -> Result<StoredSamples> {
        let pod = header.data_type.pod;
        let mut state = SampleState::new(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            let payload = encode_payload(sample, pod);
            let key = SampleKey::new(&payload, pod)?;
            state.hash = mix(state.hash, key.digest)?;
            if i == 0 || state.is_new(&key) {
                let pos = self.write_keyed(&payload, key)?;
                state.push(i as u32, key, &[make_data_offset(pos)]);
            }
        }
        self.finish_property(header, state)
    }

    fn write_array_samples(&mut self, header: &PropertyHeader, samples: &[ArraySample]) -> Result<StoredSamples> {
        let data_type = header.data_type;
        let mut state = SampleState::new(samples.len());
        let mut prev_dims: Option<&Dimensions> = None;
        for (i, sample) in samples.iter().enumerate() {
            let payload = encode_payload(&sample.data, data_type.pod);
            let key = SampleKey::new(&payload, data_type.pod)?;
            let mut dims_bytes = Vec::with_capacity(sample.dimensions.rank() * 8);
            for size in sample.dimensions.sizes() {
                dims_bytes.extend_from_slice(&(*size as u64).to_le_bytes());
            }
            state.hash = mix(mix(state.hash, key.digest)?, digest(&dims_bytes, 0)?)?;

            let same_dims = prev_dims == Some(&sample.dimensions);
            if i > 0 && !state.is_new(&key) && same_dims {
                continue;
            }

            let data_pos = self.write_keyed(&payload, key)?;
            let dims_offset = if sample.dimensions.rank() <= 1 && !data_type.pod.is_string() {
                EMPTY_DATA
            } else {
                make_data_offset(self.write_data(&dims_bytes)?)
            };

            let points = sample.dimensions.num_points() * data_type.extent as usize;
            if data_type.extent != 1 || state.prev_points.is_some_and(|p| p != points) {
                state.range.homogenous = false;
            }
            state.prev_points = Some(points);
            prev_dims = Some(&sample.dimensions);
            state.push(i as u32, key, &[make_data_offset(data_pos), dims_offset]);
        }
        self.finish_property(header, state)
    }

    fn scalar_samples(&mut self, scalar: &ScalarData) -> Result<StoredSamples> {
        match &scalar.stored {
            Some(stored) if stored.is_written() => Ok(stored.clone()),
            _ => {
                let samples = scalar.load()?;
                self.write_scalar_samples(&scalar.header, &samples)
            }
        }
    }

    fn array_samples(&mut self, array: &ArrayData) -> Result<StoredSamples> {
        match &array.stored {
            Some(stored) if stored.is_written() => Ok(stored.clone()),
            _ => {
                let samples = array.load()?;
                self.write_array_samples(&array.header, &samples)
            }
        }
    }

    fn spill_compound(&mut self, compound: &mut CompoundData) -> Result<()> {
        for prop in &mut compound.children {
            match prop {
                PropertyData::Compound(c) => self.spill_compound(c)?,
                PropertyData::Scalar(s) => {
                    let stored = self.scalar_samples(s)?;
                    s.samples = Vec::new();
                    s.stored = Some(stored);
                }
                PropertyData::Array(a) => {
                    let stored = self.array_samples(a)?;
                    a.samples = Vec::new();
                    a.stored = Some(stored);
                }
            }
        }
        Ok(())
    }

    /// Index of `serialized` in the indexed metadata table, or
    /// [`INLINE_META_DATA`] when it has to be stored inline.
    fn meta_data_index(&mut self, serialized: &str) -> u8 {
        if serialized.is_empty() {
            return 0;
        }
        if let Some(&index) = self.meta_index.get(serialized) {
            return index;
        }
        if self.meta_data.len() >= INLINE_META_DATA as usize || serialized.len() > 255 {
            return INLINE_META_DATA;
        }
        let index = self.meta_data.len() as u8;
        self.meta_data.push(serialized.to_string());
        self.meta_index.insert(serialized.to_string(), index);
        index
    }

    fn property_headers(&mut self, props: &[PropertyData], ranges: &[SampleRange]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (prop, range) in props.iter().zip(ranges) {
            let header = prop.header();
            let meta = header.meta_data.serialize();
            let meta_index = self.meta_data_index(&meta);
            let is_compound = header.property_type == PropertyType::Compound;

            let widest = (meta.len() as u32)
                .max(header.name.len() as u32)
                .max(range.num_samples)
                .max(header.time_sampling_index);
            let hint: u32 = match widest {
                0..=255 => 0,
                256..=65535 => 1,
                _ => 2,
            };

            let mut info = hint << 2;
            info |= match prop.property_type() {
                PropertyType::Compound => 0,
                PropertyType::Scalar => 1,
                PropertyType::Array => 2,
            };
            if !is_compound {
                info |= (header.data_type.pod as u32 & 0xf) << 4;
                info |= (header.data_type.extent as u32) << 12;
                if range.homogenous {
                    info |= 0x400;
                }
                if header.time_sampling_index != 0 {
                    info |= 0x100;
                }
                if range.first_changed == 0 && range.last_changed == 0 {
                    info |= 0x800;
                } else if range.first_changed != 1 || range.last_changed != range.num_samples.saturating_sub(1) {
                    info |= 0x200;
                }
            }
            info |= (meta_index as u32) << 20;
            buf.extend_from_slice(&info.to_le_bytes());

            if !is_compound {
                write_with_hint(&mut buf, range.num_samples, hint);
                if info & 0x200 != 0 {
                    write_with_hint(&mut buf, range.first_changed, hint);
                    write_with_hint(&mut buf, range.last_changed, hint);
                }
                if info & 0x100 != 0 {
                    write_with_hint(&mut buf, header.time_sampling_index, hint);
                }
            }

            write_with_hint(&mut buf, header.name.len() as u32, hint);
            buf.extend_from_slice(header.name.as_bytes());
            if meta_index == INLINE_META_DATA {
                write_with_hint(&mut buf, meta.len() as u32, hint);
                buf.extend_from_slice(meta.as_bytes());
            }
        }
        buf
    }

    /// Compound group: one group per property, then the headers block.
    fn write_compound(&mut self, compound: &CompoundData) -> Result<(u64, u128)> {
        if compound.children.is_empty() {
            return Ok((0, 0));
        }
        let mut children = Vec::with_capacity(compound.children.len() + 1);
        let mut ranges = Vec::with_capacity(compound.children.len());
        let mut hash = 0u128;
        for prop in &compound.children {
            let (pos, range, prop_hash) = match prop {
                PropertyData::Compound(c) => {
                    let (pos, h) = self.write_compound(c)?;
                    (pos, SampleRange::default(), h)
                }
                PropertyData::Scalar(s) => {
                    let stored = self.scalar_samples(s)?;
                    (stored.group(), stored.range(), stored.hash())
                }
                PropertyData::Array(a) => {
                    let stored = self.array_samples(a)?;
                    (stored.group(), stored.range(), stored.hash())
                }
            };
            children.push(make_group_offset(pos));
            ranges.push(range);
            hash = mix(hash, prop_hash)?;
        }
        let headers = self.property_headers(&compound.children, &ranges);
        children.push(make_data_offset(self.write_data(&headers)?));
        Ok((self.write_group(&children)?, hash))
    }

    fn object_headers(&mut self, children: &[ObjectData], data_hash: u128, child_hash: u128) -> Vec<u8> {
        let mut buf = Vec::new();
        for child in children {
            let name = child.header.name.as_bytes();
            write_with_hint(&mut buf, name.len() as u32, 2);
            buf.extend_from_slice(name);
            let meta = child.header.meta_data.serialize();
            let index = self.meta_data_index(&meta);
            buf.push(index);
            if index == INLINE_META_DATA {
                write_with_hint(&mut buf, meta.len() as u32, 2);
                buf.extend_from_slice(meta.as_bytes());
            }
        }
        buf.extend_from_slice(&data_hash.to_le_bytes());
        buf.extend_from_slice(&child_hash.to_le_bytes());
        buf
    }

    /// Object group: properties, child objects, then the child headers.
    fn write_object(&mut self, obj: &ObjectData) -> Result<(u64, u128)> {
        let mut child_groups = Vec::with_capacity(obj.children.len());
        let mut child_hash = 0u128;
        for child in &obj.children {
            let (pos, hash) = self.write_object(child)?;
            child_groups.push(make_group_offset(pos));
            child_hash = mix(child_hash, hash)?;
        }

        let (props_pos, data_hash) = self.write_compound(&obj.properties)?;
        let headers = self.object_headers(&obj.children, data_hash, child_hash);
        let headers_pos = self.write_data(&headers)?;

        let mut children = Vec::with_capacity(child_groups.len() + 2);
        children.push(make_group_offset(props_pos));
        children.extend(child_groups);
        children.push(make_data_offset(headers_pos));
        let pos = self.write_group(&children)?;

        let own = digest(
            format!("{}{}", obj.header.meta_data.serialize(), obj.header.name).as_bytes(),
            0,
        )?;
        Ok((pos, mix(mix(child_hash, data_hash)?, own)?))
    }

    fn indexed_meta_data(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for meta in &self.meta_data[1..] {
            buf.push(meta.len() as u8);
            buf.extend_from_slice(meta.as_bytes());
        }
        buf
    }
}

/// Time sampling table: max samples, time per cycle, stored times.
pub fn serialize_time_samplings(samplings: &[TimeSampling], max_samples: &[usize]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, ts) in samplings.iter().enumerate() {
        let max = max_samples.get(i).copied().unwrap_or(0).min(u32::MAX as usize) as u32;
        buf.extend_from_slice(&max.to_le_bytes());
        buf.extend_from_slice(&ts.sampling_type.time_per_cycle.to_le_bytes());
        let times = if ts.stored_times.is_empty() && !ts.is_acyclic() {
            vec![ts.start_time()]
        } else {
            ts.stored_times.clone()
        };
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for t in times {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }
    buf
}

impl ArchiveWriter for OgawaWriter {
    fn spill(&mut self, compound: &mut CompoundData) -> Result<()> {
        self.spill_compound(compound)
    }

    fn finish(self: Box<Self>, archive: &ArchiveData, compression: i32) -> Result<()> {
        let mut this = *self;
        if compression >= 0 {
            tracing::debug!("{}: ogawa archives are not compressed", this.path.display());
        }

        let version_pos = this.write_data(&OGAWA_FILE_VERSION.to_le_bytes())?;
        let library_pos = this.write_data(&LIBRARY_VERSION.to_le_bytes())?;
        let (root_pos, _) = this.write_object(&archive.root)?;

        let mut meta = archive.meta_data.clone();
        if !meta.contains(MetaData::ALEMBIC_VERSION_KEY) {
            meta.set(MetaData::ALEMBIC_VERSION_KEY, library_version_string());
        }
        let meta_pos = this.write_data(meta.serialize().as_bytes())?;
        let ts_pos = this.write_data(&serialize_time_samplings(&archive.time_samplings, &archive.max_samples))?;
        let indexed = this.indexed_meta_data();
        let indexed_pos = this.write_data(&indexed)?;

        let root = this.write_group(&[
            make_data_offset(version_pos),
            make_data_offset(library_pos),
            make_group_offset(root_pos),
            make_data_offset(meta_pos),
            make_data_offset(ts_pos),
            make_data_offset(indexed_pos),
        ])?;

        this.stream.seek(FROZEN_OFFSET as u64)?;
        this.stream.write_u8(FROZEN_FLAG)?;
        this.stream.seek(ROOT_POS_OFFSET as u64)?;
        this.stream.write_u64(root)?;
        tracing::debug!(
            "{}: {} sample blocks, {} indexed metadata entries",
            this.path.display(),
            this.written.len(),
            this.meta_data.len() - 1
        );
        this.stream.finish()
    }
}
