//! Ogawa container constants and child offset helpers.

/// Magic bytes at the start of an Ogawa file.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

pub const FROZEN_OFFSET: usize = 5;
pub const VERSION_OFFSET: usize = 6;
pub const ROOT_POS_OFFSET: usize = 8;

/// Container version, stored big-endian (`{0, 1}`).
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag once the root group position has been written.
pub const FROZEN_FLAG: u8 = 0xFF;
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// Child offsets with the MSB set point at data, clear at a group.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;
pub const OFFSET_MASK: u64 = !TYPE_FLAG_MASK;

/// Offset 0 with the data bit set: zero-length data.
pub const EMPTY_DATA: u64 = TYPE_FLAG_MASK;

/// Size of the digest prefix of every sample data block.
pub const DATA_KEY_SIZE: usize = 16;

/// Archive layout version written to child 0 of the root group.
pub const OGAWA_FILE_VERSION: i32 = 0;
pub const MAX_OGAWA_FILE_VERSION: i32 = 1;

/// Library version written to child 1 of the root group (1.8.10).
pub const LIBRARY_VERSION: i32 = 10810;
pub const MIN_LIBRARY_VERSION: i32 = 9999;

/// Children of the archive root group.
pub const ROOT_CHILD_COUNT: u64 = 6;

/// Metadata index marking inline metadata.
pub const INLINE_META_DATA: u8 = 0xff;

#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    offset & TYPE_FLAG_MASK == 0
}

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    offset & TYPE_FLAG_MASK != 0
}

#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(is_group_offset(group));
        assert_eq!(extract_offset(group), 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(data, 0x8000_0000_0000_5678);
        assert_eq!(extract_offset(data), 0x5678);

        assert!(is_data_offset(EMPTY_DATA));
        assert_eq!(extract_offset(EMPTY_DATA), 0);
    }
}
