//! Page format constants

/// Current page format revision
pub const PAGE_VERSION: u8 = 1;

/// Page header size in bytes
pub const PAGE_HEADER_SIZE: usize = 64;

/// Size of one stored measurement
pub const MEAS_SIZE: usize = 40;

/// Size of one index record
pub const INDEX_RECORD_SIZE: usize = 48;

/// Extension of page data files
pub const PAGE_EXTENSION: &str = "page";

/// Suffix appended to a page file name to get its index file name
pub const INDEX_SUFFIX: &str = "i";

/// Header `is_open` / `min_max_init` value for "set"
pub const FLAG_SET: u8 = 1;

/// Number of measurement slots in a page file of `size` bytes
pub fn records_in(size: u64) -> u64 {
    size.saturating_sub(PAGE_HEADER_SIZE as u64) / MEAS_SIZE as u64
}
