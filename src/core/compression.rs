//! zlib helpers for archive bodies.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Map a compression hint (-1..=9) to a zlib level. Negative means store.
pub fn compression_level(hint: i32) -> Option<Compression> {
    match hint {
        i32::MIN..=-1 => None,
        0..=9 => Some(Compression::new(hint as u32)),
        _ => Some(Compression::best()),
    }
}

/// Compress `data` with zlib at `level`.
pub fn compress(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Upper bound on the deflate expansion ratio.
const MAX_INFLATE_RATIO: usize = 1032;

/// Inflate a zlib stream. `expected_len` is the uncompressed size recorded
/// by the writer; a mismatch means the body is corrupt.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let limit = data.len().saturating_mul(MAX_INFLATE_RATIO);
    if expected_len > limit {
        return Err(Error::invalid(format!(
            "header claims {} bytes from a {} byte zlib stream",
            expected_len,
            data.len()
        )));
    }
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::invalid(format!("corrupt zlib stream: {}", e)))?;
    if out.len() != expected_len {
        return Err(Error::invalid(format!(
            "decompressed body is {} bytes, header says {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original: Vec<u8> = (0..2000).map(|i| (i % 7) as u8).collect();
        let packed = compress(&original, Compression::default()).unwrap();
        assert!(packed.len() < original.len());
        assert_eq!(decompress(&packed, original.len()).unwrap(), original);
    }

    #[test]
    fn test_decompress_length_check() {
        let packed = compress(b"hello", Compression::fast()).unwrap();
        assert!(decompress(&packed, 6).is_err());
    }

    #[test]
    fn test_decompress_rejects_huge_length() {
        let packed = compress(b"hello", Compression::fast()).unwrap();
        assert!(matches!(
            decompress(&packed, usize::MAX),
            Err(Error::InvalidStructure(_))
        ));
        assert!(matches!(
            decompress(b"not zlib", 4),
            Err(Error::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_levels() {
        assert!(compression_level(-1).is_none());
        assert_eq!(compression_level(0), Some(Compression::none()));
        assert_eq!(compression_level(42), Some(Compression::best()));
    }
}
