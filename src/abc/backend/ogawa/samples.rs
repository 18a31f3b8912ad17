//! Property samples that live in an Ogawa file instead of in memory.
//!
//! A property group stores sample 0 and the samples from the first to the
//! last changed index; every other index repeats one of those. Scalar
//! groups hold one data child per stored sample, array groups a data and
//! a dimensions child per stored sample.

use std::fmt;
use std::sync::Arc;

use super::format::{extract_offset, is_data_offset, DATA_KEY_SIZE};
use super::reader::{IData, IStreams};
use crate::core::{ArraySample, SampleData};
use crate::util::{DataType, Dimensions, Error, PlainOldDataType, Result};

/// Handle on the samples of one scalar or array property.
#[derive(Clone)]
pub struct StoredSamples {
    /// `None` once the samples were written to an archive still open for
    /// writing; they can no longer be read back through this handle.
    streams: Option<Arc<IStreams>>,
    children: Arc<[u64]>,
    group: u64,
    num_samples: u32,
    first_changed: u32,
    last_changed: u32,
    homogenous: bool,
    hash: u128,
}

/// Sample bookkeeping shared by the reader and the writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleRange {
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
    pub homogenous: bool,
}

impl StoredSamples {
    /// Samples of an input file, addressed by the property group's children.
    pub(super) fn in_file(streams: Arc<IStreams>, group: u64, children: &[u64], range: SampleRange) -> Self {
        Self {
            streams: Some(streams),
            children: children.into(),
            group,
            num_samples: range.num_samples,
            first_changed: range.first_changed,
            last_changed: range.last_changed,
            homogenous: range.homogenous,
            hash: 0,
        }
    }

    /// Samples already written to the output as the group at `group`.
    pub(super) fn written(group: u64, range: SampleRange, hash: u128) -> Self {
        Self {
            streams: None,
            children: Arc::from(Vec::new()),
            group,
            num_samples: range.num_samples,
            first_changed: range.first_changed,
            last_changed: range.last_changed,
            homogenous: range.homogenous,
            hash,
        }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples as usize
    }

    /// All samples share the value of sample 0.
    pub fn is_constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }

    /// True when the samples sit in an output archive being written.
    pub fn is_written(&self) -> bool {
        self.streams.is_none()
    }

    pub(super) fn group(&self) -> u64 {
        self.group
    }

    pub(super) fn range(&self) -> SampleRange {
        SampleRange {
            num_samples: self.num_samples,
            first_changed: self.first_changed,
            last_changed: self.last_changed,
            homogenous: self.homogenous,
        }
    }

    pub(super) fn hash(&self) -> u128 {
        self.hash
    }

    /// Position among the stored samples of sample `index`.
    fn stored_index(&self, index: usize) -> usize {
        let (first, last) = (self.first_changed as usize, self.last_changed as usize);
        if index < first || (first == 0 && last == 0) {
            0
        } else if index >= last {
            last - first + 1
        } else {
            index - (first - 1)
        }
    }

    fn data(&self, child: usize) -> Result<IData> {
        let streams = self
            .streams
            .as_ref()
            .ok_or_else(|| Error::other("samples were already written to an output archive"))?;
        let offset = *self.children.get(child).ok_or_else(|| {
            Error::invalid(format!(
                "property group at {}: child {} of {}",
                self.group,
                child,
                self.children.len()
            ))
        })?;
        if !is_data_offset(offset) {
            return Err(Error::invalid(format!("property group at {}: child {} is a group", self.group, child)));
        }
        IData::new(streams.clone(), extract_offset(offset))
    }

    pub fn read_scalar(&self, data_type: DataType, index: usize) -> Result<SampleData> {
        let bytes = self.data(self.stored_index(index))?.read_all()?;
        decode_payload(data_type.pod, strip_key(&bytes)?)
    }

    pub fn read_array(&self, data_type: DataType, index: usize) -> Result<ArraySample> {
        let stored = self.stored_index(index);
        let bytes = self.data(stored * 2)?.read_all()?;
        let data = decode_payload(data_type.pod, strip_key(&bytes)?)?;

        let dims = self.data(stored * 2 + 1)?.read_all()?;
        let dimensions = if dims.is_empty() {
            let elements = match &data {
                SampleData::Strings(s) => s.len() / data_type.extent.max(1) as usize,
                SampleData::Pod(b) => match data_type.num_bytes() {
                    0 => 0,
                    n => b.len() / n,
                },
            };
            Dimensions::d1(elements)
        } else {
            if dims.len() % 8 != 0 {
                return Err(Error::invalid(format!("dimensions block of {} bytes", dims.len())));
            }
            let sizes: Vec<usize> = dims
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as usize)
                .collect();
            Dimensions::from_slice(&sizes)
        };
        Ok(ArraySample { data, dimensions })
    }
}

impl fmt::Debug for StoredSamples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSamples")
            .field("group", &self.group)
            .field("num_samples", &self.num_samples)
            .field("first_changed", &self.first_changed)
            .field("last_changed", &self.last_changed)
            .field("written", &self.is_written())
            .finish()
    }
}

impl PartialEq for StoredSamples {
    fn eq(&self, other: &Self) -> bool {
        let same_file = match (&self.streams, &other.streams) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_file && self.group == other.group && self.range() == other.range()
    }
}

fn strip_key(bytes: &[u8]) -> Result<&[u8]> {
    match bytes.len() {
        0 => Ok(bytes),
        n if n < DATA_KEY_SIZE => Err(Error::invalid(format!("sample block of {} bytes", n))),
        _ => Ok(&bytes[DATA_KEY_SIZE..]),
    }
}

/// Encode a sample payload: strings are NUL-terminated, wide strings are
/// UTF-32 with a 4-byte terminator, everything else is copied.
pub fn encode_payload(sample: &SampleData, pod: PlainOldDataType) -> Vec<u8> {
    match sample {
        SampleData::Pod(bytes) => bytes.clone(),
        SampleData::Strings(strings) if pod == PlainOldDataType::Wstring => {
            let mut out = Vec::new();
            for s in strings {
                for c in s.chars() {
                    out.extend_from_slice(&(c as u32).to_le_bytes());
                }
                out.extend_from_slice(&[0; 4]);
            }
            out
        }
        SampleData::Strings(strings) => {
            let mut out = Vec::with_capacity(strings.iter().map(|s| s.len() + 1).sum());
            for s in strings {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            out
        }
    }
}

pub fn decode_payload(pod: PlainOldDataType, payload: &[u8]) -> Result<SampleData> {
    match pod {
        PlainOldDataType::String => {
            let body = payload.strip_suffix(&[0]).unwrap_or(payload);
            if payload.is_empty() {
                return Ok(SampleData::Strings(Vec::new()));
            }
            let strings = body
                .split(|b| *b == 0)
                .map(|s| String::from_utf8(s.to_vec()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(SampleData::Strings(strings))
        }
        PlainOldDataType::Wstring => {
            if payload.len() % 4 != 0 {
                return Err(Error::invalid(format!("wide string payload of {} bytes", payload.len())));
            }
            let mut strings = Vec::new();
            let mut current = String::new();
            for c in payload.chunks_exact(4) {
                match u32::from_le_bytes([c[0], c[1], c[2], c[3]]) {
                    0 => strings.push(std::mem::take(&mut current)),
                    code => current.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)),
                }
            }
            if !current.is_empty() {
                strings.push(current);
            }
            Ok(SampleData::Strings(strings))
        }
        _ => Ok(SampleData::Pod(payload.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(num_samples: u32, first_changed: u32, last_changed: u32) -> StoredSamples {
        let range = SampleRange { num_samples, first_changed, last_changed, homogenous: true };
        StoredSamples::written(0, range, 0)
    }

    #[test]
    fn test_stored_index() {
        let constant = range(5, 0, 0);
        assert!(constant.is_constant());
        assert_eq!((0..5).map(|i| constant.stored_index(i)).collect::<Vec<_>>(), vec![0; 5]);

        // samples 0, 3, 4, 5 stored; 1-2 repeat 0, 6-7 repeat 5
        let middle = range(8, 3, 5);
        let got: Vec<_> = (0..8).map(|i| middle.stored_index(i)).collect();
        assert_eq!(got, vec![0, 0, 0, 1, 2, 3, 3, 3]);

        let all = range(4, 1, 3);
        let got: Vec<_> = (0..4).map(|i| all.stored_index(i)).collect();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_string_payloads() {
        let s = SampleData::from_strings(["ab", "", "c"]);
        let bytes = encode_payload(&s, PlainOldDataType::String);
        assert_eq!(bytes, b"ab\0\0c\0");
        assert_eq!(decode_payload(PlainOldDataType::String, &bytes).unwrap(), s);

        let wide = SampleData::from_strings(["hé"]);
        let bytes = encode_payload(&wide, PlainOldDataType::Wstring);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_payload(PlainOldDataType::Wstring, &bytes).unwrap(), wide);

        let empty = SampleData::Strings(Vec::new());
        assert!(encode_payload(&empty, PlainOldDataType::String).is_empty());
        assert_eq!(decode_payload(PlainOldDataType::String, &[]).unwrap(), empty);
    }

    #[test]
    fn test_written_samples_cannot_be_read() {
        let written = range(2, 1, 1);
        assert!(written.is_written());
        assert!(written.read_scalar(DataType::FLOAT32, 0).is_err());
    }
}
