//! Sparse skip index stored next to each page
//!
//! One [`IndexRecord`] is appended per page append call and describes the
//! slot run that call wrote. Readers use the records' time and id bounds to
//! skip runs that cannot intersect a query. Granularity follows append calls,
//! not records: single-record appends produce one index record per
//! measurement, bulk appends a much sparser index.

use crate::common::error::Result;
use crate::storage::page_constants::INDEX_RECORD_SIZE;
use crate::types::{Id, Meas, Time};
use bytemuck::{Pod, Zeroable};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bounds of one contiguous run of page slots `[pos, pos + count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct IndexRecord {
    /// Smallest time in the run
    pub min_time: Time,
    /// Largest time in the run
    pub max_time: Time,
    /// Smallest id in the run
    pub min_id: Id,
    /// Largest id in the run
    pub max_id: Id,
    /// Number of slots
    pub count: u64,
    /// First slot
    pub pos: u64,
}

impl IndexRecord {
    /// Describe `run`, written starting at slot `pos`
    pub fn for_run(pos: u64, run: &[Meas]) -> Option<Self> {
        let (first, rest) = run.split_first()?;
        let mut rec = Self {
            min_time: first.time,
            max_time: first.time,
            min_id: first.id,
            max_id: first.id,
            count: run.len() as u64,
            pos,
        };
        for m in rest {
            rec.min_time = rec.min_time.min(m.time);
            rec.max_time = rec.max_time.max(m.time);
            rec.min_id = rec.min_id.min(m.id);
            rec.max_id = rec.max_id.max(m.id);
        }
        Some(rec)
    }

    /// One past the last slot of the run
    pub fn end(&self) -> u64 {
        self.pos + self.count
    }

    /// Coarse overlap test against a time interval and an optional id range
    pub fn intersects(&self, from: Time, to: Time, ids: Option<(Id, Id)>) -> bool {
        let time_ok = self.min_time <= to && from <= self.max_time;
        match ids {
            Some((lo, hi)) => time_ok && self.min_id <= hi && lo <= self.max_id,
            None => time_ok,
        }
    }
}

/// Index file of one page
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    writer: Option<File>,
}

impl Index {
    /// Index at `path`; the file is opened lazily on first write
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Start an empty index at `path`, discarding any previous content
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        File::create(&path)?;
        Ok(Self::new(path))
    }

    /// Index file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record to the index file
    ///
    /// # Errors
    ///
    /// Returns an error if the index file cannot be opened or written.
    pub fn write_index_rec(&mut self, rec: &IndexRecord) -> Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(file);
        }
        if let Some(file) = self.writer.as_mut() {
            file.write_all(bytemuck::bytes_of(rec))?;
        }
        Ok(())
    }

    /// Flush written records to disk
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        if let Some(file) = self.writer.as_mut() {
            file.sync_data()?;
        }
        Ok(())
    }

    /// All records currently in the index file
    ///
    /// A trailing partial record (a write still in flight) is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn records(&self) -> Result<Vec<IndexRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)?;
        let whole = bytes.len() / INDEX_RECORD_SIZE * INDEX_RECORD_SIZE;
        Ok(bytes[..whole]
            .chunks_exact(INDEX_RECORD_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Records whose time range intersects `[from, to]` and, when `id_range`
    /// is given, whose id range intersects it
    ///
    /// # Errors
    ///
    /// Returns an error if the index file cannot be read.
    pub fn find_in_index(
        &self,
        id_range: Option<(Id, Id)>,
        from: Time,
        to: Time,
    ) -> Result<Vec<IndexRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|rec| rec.intersects(from, to, id_range))
            .collect())
    }
}
