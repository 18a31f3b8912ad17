//! Pluggable file backends.
//!
//! A backend reads an archive file into an [`ArchiveData`] tree and writes
//! one back. Writers choose the backend from the output path, readers
//! detect it from the file's leading bytes.
//!
//! [`ogawa`] is the Alembic container and the default. It reads lazily and
//! writes samples while the tree is built. The binary and JSON backends
//! decode and encode whole trees.

mod binary;
mod json;
mod ogawa;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{ArchiveData, CompoundData};
use crate::util::{Error, Result};

pub use binary::{BinaryBackend, BINARY_MAGIC, BINARY_VERSION, HEADER_SIZE};
pub use json::{JsonBackend, JSON_FORMAT_NAME};
pub use ogawa::{OgawaBackend, OgawaWriter, StoredSamples, OGAWA_MAGIC};

/// A storage backend.
pub trait ArchiveBackend {
    fn kind(&self) -> BackendKind;

    /// Read an archive. Backends may leave samples in the file.
    fn read(&self, path: &Path) -> Result<ArchiveData>;

    /// Encode and write `archive`. `compression` is a hint in -1..=9.
    fn write(&self, path: &Path, archive: &ArchiveData, compression: i32) -> Result<()>;

    /// Start writing an archive at `path`. The file is created right away.
    fn create(&self, path: &Path) -> Result<Box<dyn ArchiveWriter>> {
        Ok(Box::new(BufferedWriter::create(self.kind(), path)?))
    }
}

/// An archive being written.
pub trait ArchiveWriter {
    /// Take over the samples of a finished compound. Properties keep their
    /// headers and sample counts.
    fn spill(&mut self, compound: &mut CompoundData) -> Result<()>;

    /// Write everything not yet written and close the file.
    fn finish(self: Box<Self>, archive: &ArchiveData, compression: i32) -> Result<()>;
}

/// Writer for backends that encode the whole tree on close.
pub struct BufferedWriter {
    kind: BackendKind,
    path: PathBuf,
}

impl BufferedWriter {
    pub fn create(kind: BackendKind, path: &Path) -> Result<Self> {
        File::create(path)?;
        Ok(Self { kind, path: path.to_path_buf() })
    }
}

impl ArchiveWriter for BufferedWriter {
    fn spill(&mut self, _compound: &mut CompoundData) -> Result<()> {
        Ok(())
    }

    fn finish(self: Box<Self>, archive: &ArchiveData, compression: i32) -> Result<()> {
        self.kind.backend().write(&self.path, archive, compression)
    }
}

/// Available backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Ogawa,
    Binary,
    Json,
}

impl BackendKind {
    /// `.json` paths use the JSON backend, everything else is Ogawa.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Ogawa,
        }
    }

    /// Identify a backend from the first bytes of a file.
    pub fn detect(head: &[u8]) -> Result<Self> {
        if head.starts_with(OGAWA_MAGIC) {
            return Ok(Self::Ogawa);
        }
        if head.starts_with(BINARY_MAGIC) {
            return Ok(Self::Binary);
        }
        match head.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Ok(Self::Json),
            _ => Err(Error::InvalidMagic),
        }
    }

    pub fn backend(self) -> Box<dyn ArchiveBackend> {
        match self {
            Self::Ogawa => Box::new(OgawaBackend::default()),
            Self::Binary => Box::new(BinaryBackend::default()),
            Self::Json => Box::new(JsonBackend),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ogawa => "ogawa",
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }
}

/// Open `path`, detect its backend and decode it.
pub fn read_archive(path: &Path) -> Result<(BackendKind, ArchiveData)> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    let mut head = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    drop(file);

    let kind = BackendKind::detect(&head[..filled])?;
    tracing::trace!("{}: {} backend", path.display(), kind.name());
    let data = kind.backend().read(path)?;
    data.validate()?;
    Ok((kind, data))
}
