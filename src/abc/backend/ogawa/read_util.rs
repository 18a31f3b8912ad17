//! Parsing of the archive tables stored in Ogawa data blocks: time
//! samplings, indexed metadata, object headers and property headers.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use super::format::INLINE_META_DATA;
use crate::core::{MetaData, PropertyHeader, PropertyType, TimeSampling, ACYCLIC_TIME_PER_CYCLE};
use crate::util::{DataType, Error, PlainOldDataType, Result};

/// Size of the hash suffix of an object headers block.
pub const OBJECT_HASH_SIZE: usize = 32;

/// Bounds-checked little-endian reads over one table.
struct TableReader<'a> {
    cursor: Cursor<&'a [u8]>,
    what: &'static str,
}

impl<'a> TableReader<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { cursor: Cursor::new(buf), what }
    }

    fn truncated(&self) -> Error {
        Error::invalid(format!("{} truncated at byte {}", self.what, self.cursor.position()))
    }

    fn has_more(&self) -> bool {
        (self.cursor.position() as usize) < self.cursor.get_ref().len()
    }

    fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|_| self.truncated())
    }

    fn f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(|_| self.truncated())
    }

    /// `u32` stored in 1, 2 or 4 bytes.
    fn u32_with_hint(&mut self, hint: u32) -> Result<u32> {
        match hint {
            0 => self.u8().map(u32::from),
            1 => self
                .cursor
                .read_u16::<LittleEndian>()
                .map(u32::from)
                .map_err(|_| self.truncated()),
            2 => self.u32(),
            _ => Err(Error::invalid(format!("{}: bad size hint {}", self.what, hint))),
        }
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let remaining = self.cursor.get_ref().len() - self.cursor.position() as usize;
        if len > remaining {
            return Err(self.truncated());
        }
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf).map_err(|_| self.truncated())?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Time samplings and the max sample count recorded for each.
pub fn read_time_samplings(buf: &[u8]) -> Result<(Vec<TimeSampling>, Vec<usize>)> {
    let mut r = TableReader::new(buf, "time samplings");
    let mut samplings = Vec::new();
    let mut max_samples = Vec::new();

    while r.has_more() {
        max_samples.push(r.u32()? as usize);
        let time_per_cycle = r.f64()?;
        let count = r.u32()? as usize;
        let acyclic = time_per_cycle == ACYCLIC_TIME_PER_CYCLE;
        if count == 0 && !acyclic {
            return Err(Error::invalid("time sampling without stored times"));
        }
        if count.saturating_mul(8) > buf.len() {
            return Err(r.truncated());
        }
        let times = (0..count).map(|_| r.f64()).collect::<Result<Vec<_>>>()?;

        samplings.push(if acyclic {
            TimeSampling::acyclic(times)
        } else if count == 1 {
            TimeSampling::uniform(time_per_cycle, times[0])
        } else {
            TimeSampling::cyclic(time_per_cycle, times)
        });
    }
    Ok((samplings, max_samples))
}

/// Indexed metadata table. Entry 0 is the implicit empty metadata.
pub fn read_indexed_metadata(buf: &[u8]) -> Result<Vec<MetaData>> {
    let mut r = TableReader::new(buf, "indexed metadata");
    let mut table = vec![MetaData::new()];
    while r.has_more() {
        let len = r.u8()? as usize;
        table.push(MetaData::parse(&r.string(len)?));
    }
    Ok(table)
}

fn lookup_meta_data(index: u8, table: &[MetaData]) -> Result<MetaData> {
    table
        .get(index as usize)
        .cloned()
        .ok_or_else(|| Error::invalid(format!("metadata index {} of {}", index, table.len())))
}

/// One child entry of an object headers block.
#[derive(Clone, Debug)]
pub struct ParsedObjectHeader {
    pub name: String,
    pub meta_data: MetaData,
}

/// Child object headers. The trailing hash suffix is skipped.
pub fn read_object_headers(buf: &[u8], meta_table: &[MetaData]) -> Result<Vec<ParsedObjectHeader>> {
    if buf.len() <= OBJECT_HASH_SIZE {
        return Ok(Vec::new());
    }
    let body = &buf[..buf.len() - OBJECT_HASH_SIZE];
    let mut r = TableReader::new(body, "object headers");
    let mut headers = Vec::new();

    while r.has_more() {
        let name_len = r.u32()? as usize;
        if name_len == 0 {
            return Err(Error::invalid("object header with empty name"));
        }
        let name = r.string(name_len)?;
        let meta_index = r.u8()?;
        let meta_data = if meta_index == INLINE_META_DATA {
            let len = r.u32()? as usize;
            MetaData::parse(&r.string(len)?)
        } else {
            lookup_meta_data(meta_index, meta_table)?
        };
        headers.push(ParsedObjectHeader { name, meta_data });
    }
    Ok(headers)
}

/// Property header plus the sample bookkeeping stored next to it.
#[derive(Clone, Debug)]
pub struct ParsedPropertyHeader {
    pub header: PropertyHeader,
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
    pub homogenous: bool,
}

/// Headers of the properties of one compound, in child order.
pub fn read_property_headers(buf: &[u8], meta_table: &[MetaData]) -> Result<Vec<ParsedPropertyHeader>> {
    let mut r = TableReader::new(buf, "property headers");
    let mut headers = Vec::new();

    while r.has_more() {
        let info = r.u32()?;
        let property_type = match info & 0x3 {
            0 => PropertyType::Compound,
            1 => PropertyType::Scalar,
            _ => PropertyType::Array,
        };
        let hint = (info >> 2) & 0x3;

        let mut parsed = ParsedPropertyHeader {
            header: PropertyHeader::compound(""),
            num_samples: 0,
            first_changed: 0,
            last_changed: 0,
            homogenous: false,
        };
        parsed.header.property_type = property_type;

        if property_type != PropertyType::Compound {
            let pod = PlainOldDataType::from_u8(((info >> 4) & 0xf) as u8);
            if pod == PlainOldDataType::Unknown {
                return Err(Error::invalid(format!("unknown POD {}", (info >> 4) & 0xf)));
            }
            let extent = ((info >> 12) & 0xff) as u8;
            parsed.header.data_type = DataType::new(pod, extent);
            parsed.homogenous = info & 0x400 != 0;

            parsed.num_samples = r.u32_with_hint(hint)?;
            (parsed.first_changed, parsed.last_changed) = if info & 0x200 != 0 {
                (r.u32_with_hint(hint)?, r.u32_with_hint(hint)?)
            } else if info & 0x800 != 0 {
                (0, 0)
            } else {
                (1, parsed.num_samples.saturating_sub(1))
            };
            if info & 0x100 != 0 {
                parsed.header.time_sampling_index = r.u32_with_hint(hint)?;
            }
        }

        let name_len = r.u32_with_hint(hint)? as usize;
        if name_len == 0 {
            return Err(Error::invalid("property header with empty name"));
        }
        parsed.header.name = r.string(name_len)?;

        let meta_index = ((info >> 20) & 0xff) as u8;
        parsed.header.meta_data = if meta_index == INLINE_META_DATA {
            let len = r.u32_with_hint(hint)? as usize;
            MetaData::parse(&r.string(len)?)
        } else {
            lookup_meta_data(meta_index, meta_table)?
        };

        headers.push(parsed);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_samplings() {
        let mut buf = Vec::new();
        // uniform 1/24 from 1/24
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(&(1.0f64 / 24.0).to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(1.0f64 / 24.0).to_le_bytes());
        // acyclic
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&ACYCLIC_TIME_PER_CYCLE.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&0.5f64.to_le_bytes());
        buf.extend_from_slice(&0.75f64.to_le_bytes());

        let (ts, max) = read_time_samplings(&buf).unwrap();
        assert_eq!(max, vec![10, 2]);
        assert!(ts[0].sampling_type.is_uniform());
        assert_eq!(ts[0].start_time(), 1.0 / 24.0);
        assert!(ts[1].is_acyclic());
        assert_eq!(ts[1].sample_time(1), 0.75);

        assert!(read_time_samplings(&buf[..buf.len() - 4]).is_err());
    }

    #[test]
    fn test_property_header_defaults() {
        // scalar float32 x3, 5 samples, ts 1, default first/last, indexed meta 1
        let info: u32 = 1 | (10 << 4) | (3 << 12) | 0x100 | 0x400 | (1 << 20);
        let mut buf = info.to_le_bytes().to_vec();
        buf.push(5);
        buf.push(1);
        buf.push(2);
        buf.extend_from_slice(b".P");

        let table = vec![MetaData::new(), MetaData::new().with("interpretation", "point")];
        let headers = read_property_headers(&buf, &table).unwrap();
        let h = &headers[0];
        assert_eq!(h.header.name, ".P");
        assert_eq!(h.header.data_type, DataType::VEC3F);
        assert_eq!(h.header.time_sampling_index, 1);
        assert_eq!((h.num_samples, h.first_changed, h.last_changed), (5, 1, 4));
        assert_eq!(h.header.meta_data.interpretation(), Some("point"));

        let bad_meta = (info & !(0xff << 20)) | (7 << 20);
        buf[..4].copy_from_slice(&bad_meta.to_le_bytes());
        assert!(read_property_headers(&buf, &table).is_err());
    }

    #[test]
    fn test_object_headers_inline_meta_data() {
        let meta = "schema=AbcGeom_Xform_v3";
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(b"xfrm");
        buf.push(INLINE_META_DATA);
        buf.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        buf.extend_from_slice(meta.as_bytes());
        buf.extend_from_slice(&[0u8; OBJECT_HASH_SIZE]);

        let headers = read_object_headers(&buf, &[MetaData::new()]).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "xfrm");
        assert_eq!(headers[0].meta_data.schema(), Some("AbcGeom_Xform_v3"));
    }
}
