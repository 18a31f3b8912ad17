//! Binary backend.
//!
//! Layout:
//!
//! ```text
//! [0..5)   magic "ABCST"
//! [5]      frozen flag (0xFF once fully written)
//! [6..8)   version, u16 LE
//! [8]      flags (bit 0: body is zlib-compressed)
//! [9..16)  reserved, zero
//! body     uncompressed: archive tree
//!          compressed:   u64 LE uncompressed size, zlib stream
//! ```
//!
//! The tree is written depth-first with little-endian integers and
//! length-prefixed strings.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{ArchiveBackend, BackendKind};
use crate::abc::{ArchiveData, ArrayData, CompoundData, ObjectData, PropertyData, ScalarData};
use crate::core::{
    compress, compression_level, decompress, ArraySample, MetaData, ObjectHeader,
    PropertyHeader, PropertyType, SampleData, TimeSampling, TimeSamplingType,
};
use crate::util::{DataType, Dimensions, Error, PlainOldDataType, Result};

pub const BINARY_MAGIC: &[u8; 5] = b"ABCST";
pub const HEADER_SIZE: usize = 16;
pub const BINARY_VERSION: u16 = 1;

const FROZEN_OFFSET: usize = 5;
const VERSION_OFFSET: usize = 6;
const FLAGS_OFFSET: usize = 8;
const FROZEN_FLAG: u8 = 0xFF;
const FLAG_COMPRESSED: u8 = 0x01;

const TAG_COMPOUND: u8 = 0;
const TAG_SCALAR: u8 = 1;
const TAG_ARRAY: u8 = 2;
const TAG_POD: u8 = 0;
const TAG_STRINGS: u8 = 1;

/// Default on-disk backend.
#[derive(Clone, Copy, Debug)]
pub struct BinaryBackend {
    /// Map the file instead of reading it into memory.
    pub use_mmap: bool,
}

impl Default for BinaryBackend {
    fn default() -> Self {
        Self { use_mmap: cfg!(feature = "mmap") }
    }
}

impl ArchiveBackend for BinaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Binary
    }

    fn read(&self, path: &Path) -> Result<ArchiveData> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        if self.use_mmap {
            // Safety: the mapping is read-only and dropped before returning.
            let mmap = unsafe { memmap2::Mmap::map(&file) }
                .map_err(|e| Error::MmapFailed(e.to_string()))?;
            decode_archive(&mmap)
        } else {
            let mut bytes = Vec::with_capacity(size as usize);
            let mut file = file;
            file.read_to_end(&mut bytes)?;
            decode_archive(&bytes)
        }
    }

    fn write(&self, path: &Path, archive: &ArchiveData, compression: i32) -> Result<()> {
        let bytes = encode_archive(archive, compression)?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Encode a whole archive including the file header.
pub fn encode_archive(archive: &ArchiveData, compression: i32) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    write_tree(&mut body, archive)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(BINARY_MAGIC);
    out.push(FROZEN_FLAG);
    out.write_u16::<LittleEndian>(BINARY_VERSION)?;

    match compression_level(compression) {
        Some(level) => {
            out.push(FLAG_COMPRESSED);
            out.resize(HEADER_SIZE, 0);
            out.write_u64::<LittleEndian>(body.len() as u64)?;
            out.extend_from_slice(&compress(&body, level)?);
        }
        None => {
            out.push(0);
            out.resize(HEADER_SIZE, 0);
            out.extend_from_slice(&body);
        }
    }
    Ok(out)
}

/// Decode a whole archive from file bytes.
pub fn decode_archive(bytes: &[u8]) -> Result<ArchiveData> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(bytes.len() as u64));
    }
    if &bytes[..BINARY_MAGIC.len()] != BINARY_MAGIC {
        return Err(Error::InvalidMagic);
    }
    if bytes[FROZEN_OFFSET] != FROZEN_FLAG {
        return Err(Error::invalid("archive was not finalized"));
    }
    let version = u16::from_le_bytes([bytes[VERSION_OFFSET], bytes[VERSION_OFFSET + 1]]);
    if version > BINARY_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let body = &bytes[HEADER_SIZE..];
    if bytes[FLAGS_OFFSET] & FLAG_COMPRESSED != 0 {
        let mut reader = TreeReader::new(body);
        let raw_len = reader.u64()? as usize;
        let inflated = decompress(&body[8..], raw_len)?;
        TreeReader::new(&inflated).archive()
    } else {
        TreeReader::new(body).archive()
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn write_tree(out: &mut Vec<u8>, archive: &ArchiveData) -> Result<()> {
    write_str(out, &archive.meta_data.serialize())?;

    out.write_u32::<LittleEndian>(archive.time_samplings.len() as u32)?;
    for ts in &archive.time_samplings {
        out.write_u32::<LittleEndian>(ts.sampling_type.samples_per_cycle)?;
        out.write_f64::<LittleEndian>(ts.sampling_type.time_per_cycle)?;
        out.write_u32::<LittleEndian>(ts.stored_times.len() as u32)?;
        for t in &ts.stored_times {
            out.write_f64::<LittleEndian>(*t)?;
        }
    }

    out.write_u32::<LittleEndian>(archive.max_samples.len() as u32)?;
    for m in &archive.max_samples {
        out.write_u64::<LittleEndian>(*m as u64)?;
    }

    write_object(out, &archive.root)
}

fn write_object(out: &mut Vec<u8>, obj: &ObjectData) -> Result<()> {
    write_str(out, &obj.header.name)?;
    write_str(out, &obj.header.full_name)?;
    write_str(out, &obj.header.meta_data.serialize())?;
    write_property_header(out, TAG_COMPOUND, &obj.properties.header)?;
    write_compound_body(out, &obj.properties)?;
    out.write_u32::<LittleEndian>(obj.children.len() as u32)?;
    for child in &obj.children {
        write_object(out, child)?;
    }
    Ok(())
}

fn write_property_header(out: &mut Vec<u8>, tag: u8, header: &PropertyHeader) -> Result<()> {
    out.push(tag);
    write_str(out, &header.name)?;
    out.push(header.data_type.pod as u8);
    out.push(header.data_type.extent);
    out.write_u32::<LittleEndian>(header.time_sampling_index)?;
    write_str(out, &header.meta_data.serialize())
}

fn write_compound_body(out: &mut Vec<u8>, compound: &CompoundData) -> Result<()> {
    out.write_u32::<LittleEndian>(compound.children.len() as u32)?;
    for child in &compound.children {
        write_property(out, child)?;
    }
    Ok(())
}

fn write_property(out: &mut Vec<u8>, prop: &PropertyData) -> Result<()> {
    match prop {
        PropertyData::Compound(c) => {
            write_property_header(out, TAG_COMPOUND, &c.header)?;
            write_compound_body(out, c)?;
        }
        PropertyData::Scalar(s) => {
            write_property_header(out, TAG_SCALAR, &s.header)?;
            let samples = s.load()?;
            out.write_u32::<LittleEndian>(samples.len() as u32)?;
            for sample in samples.iter() {
                write_sample(out, sample)?;
            }
        }
        PropertyData::Array(a) => {
            write_property_header(out, TAG_ARRAY, &a.header)?;
            let samples = a.load()?;
            out.write_u32::<LittleEndian>(samples.len() as u32)?;
            for sample in samples.iter() {
                let sizes = sample.dimensions.sizes();
                out.push(sizes.len() as u8);
                for s in sizes {
                    out.write_u64::<LittleEndian>(*s as u64)?;
                }
                write_sample(out, &sample.data)?;
            }
        }
    }
    Ok(())
}

fn write_sample(out: &mut Vec<u8>, sample: &SampleData) -> Result<()> {
    match sample {
        SampleData::Pod(bytes) => {
            out.push(TAG_POD);
            out.write_u32::<LittleEndian>(bytes.len() as u32)?;
            out.extend_from_slice(bytes);
        }
        SampleData::Strings(strings) => {
            out.push(TAG_STRINGS);
            out.write_u32::<LittleEndian>(strings.len() as u32)?;
            for s in strings {
                write_str(out, s)?;
            }
        }
    }
    Ok(())
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

struct TreeReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> TreeReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(bytes) }
    }

    fn eof(&self) -> Error {
        Error::UnexpectedEof(self.cursor.position())
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    /// Reject counts that cannot fit in the remaining bytes.
    fn count(&mut self, min_item_size: usize) -> Result<usize> {
        let n = self.u32()? as usize;
        if n.saturating_mul(min_item_size) > self.remaining() {
            return Err(self.eof());
        }
        Ok(n)
    }

    fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.eof())
    }

    fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|_| self.eof())
    }

    fn u64(&mut self) -> Result<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(|_| self.eof())
    }

    fn f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(|_| self.eof())
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let n = self.count(1)?;
        let mut buf = vec![0u8; n];
        self.cursor.read_exact(&mut buf).map_err(|_| self.eof())?;
        Ok(buf)
    }

    fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    fn archive(&mut self) -> Result<ArchiveData> {
        let meta_data = MetaData::parse(&self.string()?);

        let num_ts = self.count(16)?;
        let mut time_samplings = Vec::with_capacity(num_ts);
        for _ in 0..num_ts {
            let samples_per_cycle = self.u32()?;
            let time_per_cycle = self.f64()?;
            let n = self.count(8)?;
            let stored_times = (0..n).map(|_| self.f64()).collect::<Result<Vec<_>>>()?;
            time_samplings.push(TimeSampling {
                sampling_type: TimeSamplingType { samples_per_cycle, time_per_cycle },
                stored_times,
            });
        }

        let num_max = self.count(8)?;
        let max_samples = (0..num_max)
            .map(|_| self.u64().map(|v| v as usize))
            .collect::<Result<Vec<_>>>()?;

        let root = self.object()?;
        Ok(ArchiveData { meta_data, time_samplings, max_samples, root })
    }

    fn object(&mut self) -> Result<ObjectData> {
        let name = self.string()?;
        let full_name = self.string()?;
        let meta_data = MetaData::parse(&self.string()?);
        let properties = match self.property()? {
            PropertyData::Compound(c) => c,
            _ => return Err(Error::invalid(format!("{}: top property is not a compound", full_name))),
        };
        let num_children = self.count(12)?;
        let mut children = Vec::with_capacity(num_children);
        for _ in 0..num_children {
            children.push(self.object()?);
        }
        Ok(ObjectData {
            header: ObjectHeader::new(name, full_name).with_meta_data(meta_data),
            properties,
            children,
        })
    }

    fn property(&mut self) -> Result<PropertyData> {
        let tag = self.u8()?;
        let name = self.string()?;
        let pod = PlainOldDataType::from_u8(self.u8()?);
        let extent = self.u8()?;
        let time_sampling_index = self.u32()?;
        let meta_data = MetaData::parse(&self.string()?);

        let property_type = match tag {
            TAG_COMPOUND => PropertyType::Compound,
            TAG_SCALAR => PropertyType::Scalar,
            TAG_ARRAY => PropertyType::Array,
            other => return Err(Error::invalid(format!("property {}: bad tag {}", name, other))),
        };
        let header = PropertyHeader {
            name,
            property_type,
            data_type: DataType::new(pod, extent),
            time_sampling_index,
            meta_data,
        };

        Ok(match property_type {
            PropertyType::Compound => {
                let n = self.count(1)?;
                let mut children = Vec::with_capacity(n);
                for _ in 0..n {
                    children.push(self.property()?);
                }
                PropertyData::Compound(CompoundData { header, children })
            }
            PropertyType::Scalar => {
                let n = self.count(5)?;
                let samples = (0..n).map(|_| self.sample()).collect::<Result<Vec<_>>>()?;
                PropertyData::Scalar(ScalarData { header, samples, stored: None })
            }
            PropertyType::Array => {
                let n = self.count(6)?;
                let mut samples = Vec::with_capacity(n);
                for _ in 0..n {
                    let rank = self.u8()? as usize;
                    let sizes = (0..rank)
                        .map(|_| self.u64().map(|v| v as usize))
                        .collect::<Result<Vec<_>>>()?;
                    let data = self.sample()?;
                    samples.push(ArraySample {
                        data,
                        dimensions: Dimensions::from_slice(&sizes),
                    });
                }
                PropertyData::Array(ArrayData { header, samples, stored: None })
            }
        })
    }

    fn sample(&mut self) -> Result<SampleData> {
        match self.u8()? {
            TAG_POD => Ok(SampleData::Pod(self.bytes()?)),
            TAG_STRINGS => {
                let n = self.count(4)?;
                let strings = (0..n).map(|_| self.string()).collect::<Result<Vec<_>>>()?;
                Ok(SampleData::Strings(strings))
            }
            other => Err(Error::invalid(format!("bad sample tag {}", other))),
        }
    }
}
