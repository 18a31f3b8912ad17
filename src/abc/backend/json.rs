//! JSON backend (serde_json).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ArchiveBackend, BackendKind};
use crate::abc::ArchiveData;
use crate::util::{Error, Result};

/// Value of the document's `format` field.
pub const JSON_FORMAT_NAME: &str = "abc-stitch";

const JSON_VERSION: u16 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    format: &'a str,
    version: u16,
    archive: &'a ArchiveData,
}

#[derive(Deserialize)]
struct Document {
    format: String,
    version: u16,
    archive: ArchiveData,
}

/// Human-readable archive storage. Mostly useful for inspecting stitched
/// output and for small test fixtures.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBackend;

impl ArchiveBackend for JsonBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    fn read(&self, path: &Path) -> Result<ArchiveData> {
        let file = File::open(path)?;
        let doc: Document = serde_json::from_reader(BufReader::new(file))?;
        if doc.format != JSON_FORMAT_NAME {
            return Err(Error::InvalidMagic);
        }
        if doc.version > JSON_VERSION {
            return Err(Error::UnsupportedVersion(doc.version));
        }
        Ok(doc.archive)
    }

    fn write(&self, path: &Path, archive: &ArchiveData, _compression: i32) -> Result<()> {
        // samples still in an input file are not serialized
        let archive = archive.materialized()?;
        let doc = DocumentRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            archive: &archive,
        };
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &doc)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}
