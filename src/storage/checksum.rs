//! CRC32 checksum of the written record region of a page

use crc32fast::Hasher;

/// Calculate CRC32 checksum for data
pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Checksum stored in the header on close
///
/// Covers the written record slots plus the write position, so truncating
/// `write_pos` is detected as well as flipped record bytes.
pub fn calculate_page_checksum(records: &[u8], write_pos: u64) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&write_pos.to_le_bytes());
    hasher.update(records);
    hasher.finalize()
}
