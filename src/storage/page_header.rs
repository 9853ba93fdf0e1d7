//! Page header structure - exactly 64 bytes at the beginning of each page file

use crate::storage::page_constants::{FLAG_SET, PAGE_VERSION};
use crate::types::{Id, Meas, Time};
use bytemuck::{Pod, Zeroable};

/// Page header
///
/// `min_*`/`max_*` aggregate every record ever appended and are meaningful
/// only once `min_max_init` is set. `is_open` is advisory: a killed process
/// leaves it set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PageHeader {
    /// Format revision (1 byte)
    pub version: u8,
    /// Min/max fields hold data (1 byte)
    pub min_max_init: u8,
    /// Page currently open for writing (1 byte)
    pub is_open: u8,
    /// Reserved (5 bytes)
    pub reserved: [u8; 5],
    /// File size in bytes (8 bytes)
    pub size: u64,
    /// Written slot count (8 bytes)
    pub write_pos: u64,
    /// Smallest time appended (8 bytes)
    pub min_time: Time,
    /// Largest time appended (8 bytes)
    pub max_time: Time,
    /// Smallest id appended (8 bytes)
    pub min_id: Id,
    /// Largest id appended (8 bytes)
    pub max_id: Id,
    /// CRC32 of the written records, stored on close (4 bytes)
    pub checksum: u32,
    /// Reserved (4 bytes)
    pub reserved2: u32,
    // Total: 64 bytes
}

impl PageHeader {
    /// Fresh header for a page file of `size` bytes
    pub fn new(size: u64) -> Self {
        Self {
            version: PAGE_VERSION,
            size,
            ..Self::default()
        }
    }

    /// Check the advisory open marker
    pub fn is_open(&self) -> bool {
        self.is_open == FLAG_SET
    }

    /// Set or clear the advisory open marker
    pub fn set_open(&mut self, open: bool) {
        self.is_open = u8::from(open);
    }

    /// Whether any record has been appended
    pub fn min_max_initialized(&self) -> bool {
        self.min_max_init == FLAG_SET
    }

    /// Fold one record into the running min/max aggregates
    pub fn update_min_max(&mut self, value: &Meas) {
        if self.min_max_initialized() {
            self.min_time = self.min_time.min(value.time);
            self.max_time = self.max_time.max(value.time);
            self.min_id = self.min_id.min(value.id);
            self.max_id = self.max_id.max(value.id);
        } else {
            self.min_max_init = FLAG_SET;
            self.min_time = value.time;
            self.max_time = value.time;
            self.min_id = value.id;
            self.max_id = value.id;
        }
    }

    /// `[from, to]` lies within the page's time range
    pub fn contains_interval(&self, from: Time, to: Time) -> bool {
        self.min_time <= from && self.max_time >= to
    }

    /// The page's time range lies within `[from, to]`
    pub fn inside_interval(&self, from: Time, to: Time) -> bool {
        from <= self.min_time && self.max_time <= to
    }

    /// The page's id range intersects `[from, to]`
    pub fn intersects_ids(&self, from: Id, to: Id) -> bool {
        self.min_max_initialized() && self.min_id <= to && from <= self.max_id
    }
}
