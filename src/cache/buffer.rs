//! Bounded in-memory write buffer

use crate::types::{in_interval, Meas, Time};
use std::ops::{Add, AddAssign};

/// Outcome of a cache append
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendResult {
    /// Records stored
    pub written: u64,
    /// Records rejected as older than the past-time cutoff
    pub ignored: u64,
}

impl AppendResult {
    /// Result with the given counts
    pub fn new(written: u64, ignored: u64) -> Self {
        Self { written, ignored }
    }

    /// Records consumed from the input, stored or not
    pub fn processed(&self) -> u64 {
        self.written + self.ignored
    }
}

impl Add for AppendResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.written + rhs.written, self.ignored + rhs.ignored)
    }
}

impl AddAssign for AppendResult {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Unordered bounded collection of measurements awaiting a flush
///
/// A full cache never blocks: the append reports `written == 0` and the caller
/// is expected to hand the cache to the writer and retry with a fresh one.
#[derive(Debug)]
pub struct Cache {
    data: Vec<Meas>,
    capacity: usize,
    syncing: bool,
}

impl Cache {
    /// Empty cache holding at most `capacity` measurements
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            syncing: false,
        }
    }

    /// Store `value` unless it is stale or the cache cannot take it
    pub fn append(&mut self, value: &Meas, past_time: Time) -> AppendResult {
        if value.time < past_time {
            return AppendResult::new(0, 1);
        }
        if self.syncing || self.is_full() {
            return AppendResult::new(0, 0);
        }
        self.data.push(*value);
        AppendResult::new(1, 0)
    }

    /// Store records of `batch` in order, stopping at the first one that does
    /// not fit
    pub fn append_batch(&mut self, batch: &[Meas], past_time: Time) -> AppendResult {
        let mut result = AppendResult::default();
        for value in batch {
            let step = self.append(value, past_time);
            if step.processed() == 0 {
                break;
            }
            result += step;
        }
        result
    }

    /// No further measurement fits
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Nothing buffered
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of buffered measurements
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Maximum number of buffered measurements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Freeze the cache for hand-off to the writer
    pub fn sync_begin(&mut self) {
        self.syncing = true;
    }

    /// Frozen for a flush
    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// Buffered measurements in insertion order
    pub fn as_array(&self) -> &[Meas] {
        &self.data
    }

    /// Buffered measurements with `from <= time <= to`
    pub fn read_interval(&self, from: Time, to: Time) -> Vec<Meas> {
        self.data
            .iter()
            .filter(|m| in_interval(from, to, m.time))
            .copied()
            .collect()
    }

    /// Drop the content and make the cache writable again
    pub fn clear(&mut self) {
        self.data.clear();
        self.syncing = false;
    }
}
