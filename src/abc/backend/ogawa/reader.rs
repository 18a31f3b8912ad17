//! Ogawa container reader: groups and data blocks addressed by file offset.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// Read access to an Ogawa file, memory-mapped or through a shared handle.
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    Mmap(Mmap),
    File(Mutex<File>),
}

impl IStreams {
    pub fn open(path: &Path, use_mmap: bool) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: the mapping is read-only and lives as long as the streams.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        let mut streams = Self { inner, version: 0, frozen: false, size };
        let mut header = [0u8; HEADER_SIZE];
        streams.read_into(0, &mut header)?;
        let (version, frozen) = parse_header(&header)?;
        streams.version = version;
        streams.frozen = frozen;
        Ok(streams)
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// True once the writer has recorded the root group.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    fn check_range(&self, pos: u64, len: u64) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::UnexpectedEof(pos.saturating_add(len))),
        }
    }

    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(pos, len as u64)?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len() as u64)?;
        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                let start = pos as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
            }
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
            }
        }
        Ok(())
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// Check the magic and return `(version, frozen)`.
pub fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if &data[..OGAWA_MAGIC.len()] != OGAWA_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
    let version = u16::from_be_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
    Ok((version, frozen))
}

/// A group: an ordered list of child offsets.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    children: Vec<u64>,
}

impl IGroup {
    /// Group at `pos`. Position 0 is the empty group.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let children = if pos == 0 {
            Vec::new()
        } else {
            let count = streams.read_u64(pos)?;
            let table = count
                .checked_mul(8)
                .ok_or_else(|| Error::invalid(format!("group at {} has {} children", pos, count)))?;
            let bytes = streams.read_bytes(pos + 8, table as usize)?;
            bytes
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        };
        Ok(Self { streams, pos, children })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn num_children(&self) -> u64 {
        self.children.len() as u64
    }

    /// Raw child offsets, type bit included.
    pub fn child_offsets(&self) -> &[u64] {
        &self.children
    }

    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }

    fn child_offset(&self, index: u64) -> Result<u64> {
        self.children.get(index as usize).copied().ok_or_else(|| {
            Error::invalid(format!(
                "group at {}: child {} of {}",
                self.pos,
                index,
                self.children.len()
            ))
        })
    }

    pub fn is_child_group(&self, index: u64) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    pub fn is_child_data(&self, index: u64) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    pub fn group(&self, index: u64) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "group".to_string(),
                actual: "data".to_string(),
            });
        }
        IGroup::new(self.streams.clone(), extract_offset(offset))
    }

    pub fn data(&self, index: u64) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "data".to_string(),
                actual: "group".to_string(),
            });
        }
        IData::new(self.streams.clone(), extract_offset(offset))
    }
}

/// A data block: `u64` size followed by the bytes.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Data block at `pos`. Position 0 is zero-length data.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(pos)? };
        if size > streams.size() {
            return Err(Error::UnexpectedEof(size));
        }
        Ok(Self { streams, pos, size })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read_bytes(self.pos + 8, self.size as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parsing() {
        let mut header = [0u8; HEADER_SIZE];
        header[..5].copy_from_slice(OGAWA_MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&CURRENT_VERSION.to_be_bytes());

        let (version, frozen) = parse_header(&header).unwrap();
        assert_eq!(version, CURRENT_VERSION);
        assert!(frozen);

        header[FROZEN_OFFSET] = NOT_FROZEN_FLAG;
        assert!(!parse_header(&header).unwrap().1);
        assert!(matches!(parse_header(&[0u8; HEADER_SIZE]), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_oversized_group_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group.abc");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(OGAWA_MAGIC);
        bytes.push(FROZEN_FLAG);
        bytes.extend_from_slice(&CURRENT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&16u64.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        for use_mmap in [false, true] {
            let streams = Arc::new(IStreams::open(&path, use_mmap).unwrap());
            let root = streams.root_pos().unwrap();
            assert!(IGroup::new(streams, root).is_err());
        }
    }
}
