//! Page - a fixed-size memory-mapped measurement store with a skip index
//!
//! File layout: a [`PageHeader`] followed by a flat array of [`Meas`]
//! records. The page owns its mapping exclusively; the header is kept as a
//! typed copy and written back to the first `PAGE_HEADER_SIZE` bytes after
//! every mutation. Every append call also appends one [`IndexRecord`] to the
//! companion index file.

use crate::common::error::{Error, Result};
use crate::storage::checksum::calculate_page_checksum;
use crate::storage::index::{Index, IndexRecord};
use crate::storage::page_constants::{
    records_in, INDEX_SUFFIX, MEAS_SIZE, PAGE_HEADER_SIZE, PAGE_VERSION,
};
use crate::storage::page_header::PageHeader;
use crate::storage::page_reader::PageReader;
use crate::types::{in_interval, Id, Meas, QueryFilter, Time};
use crate::{tempo_debug, tempo_error, tempo_warn};
use memmap2::{Mmap, MmapMut};
use std::collections::{HashSet, VecDeque};
use std::fs::OpenOptions;
use std::iter::Rev;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::slice;

enum Mapping {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(map) => &map[..],
            Mapping::Writable(map) => &map[..],
        }
    }
}

/// A run of slots an interval read visits
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanRun {
    pub(crate) slots: Range<u64>,
    /// Apply time and filter predicates; `false` copies the run verbatim
    pub(crate) filtered: bool,
}

/// Newest-first view over the written slots of a page
#[derive(Debug, Clone, Copy)]
pub struct WriteWindow<'a> {
    records: &'a [Meas],
}

impl<'a> WriteWindow<'a> {
    /// Iterate from the most recently written slot backwards
    pub fn iter(&self) -> Rev<slice::Iter<'a, Meas>> {
        self.records.iter().rev()
    }

    /// Number of slots in the window
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Window holds no slots
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for WriteWindow<'a> {
    type Item = &'a Meas;
    type IntoIter = Rev<slice::Iter<'a, Meas>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter().rev()
    }
}

/// Path of the index file belonging to page `path`
pub fn index_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

/// Memory-mapped page file plus its index
pub struct Page {
    path: PathBuf,
    map: Mapping,
    header: PageHeader,
    index: Index,
}

impl Page {
    /// Allocate a new page file of `size` bytes and open it for writing
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `size` cannot hold one record and
    /// `Error::Io` if the file cannot be created or mapped.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if records_in(size) == 0 {
            return Err(Error::invalid_input(format!(
                "page size {size} cannot hold a single record"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::io(format!("can't create {}: {e}", path.display())))?;
        file.set_len(size)?;

        // SAFETY: the file was just created by us and is only modified through
        // this mapping or read-only mappings of later readers.
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::io(format!("can't map {}: {e}", path.display())))?;

        let index = Index::create(index_path(&path))?;
        let mut header = PageHeader::new(size);
        header.set_open(true);

        let mut page = Self {
            path,
            map: Mapping::Writable(map),
            header,
            index,
        };
        page.write_header()?;
        tempo_debug!("Created page {} ({} slots)", page.path.display(), page.max_records());
        Ok(page)
    }

    /// Map an existing page file
    ///
    /// Read-only opens take a snapshot of the header and never write to the
    /// file, so any number of readers may open the same page.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be opened or mapped and
    /// `Error::Corruption` if the header does not describe the file.
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        Self::open_inner(path.as_ref(), read_only, false)
    }

    /// Open a page for writing, refusing pages whose open marker is set
    ///
    /// The marker is advisory: it survives a crash, in which case the page
    /// has to be opened with [`Page::open`].
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyOpen` if the header's open marker is set, plus
    /// the errors of [`Page::open`].
    pub fn open_checked<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), false, true)
    }

    fn open_inner(path: &Path, read_only: bool, check_open: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|e| Error::io(format!("can't open {}: {e}", path.display())))?;
        let len = file.metadata()?.len();
        if len < PAGE_HEADER_SIZE as u64 {
            return Err(Error::corruption(format!(
                "{} is too small for a page header",
                path.display()
            )));
        }

        // SAFETY: page files are only written through the single writable
        // mapping owned by the current page; records below the header's
        // write position are never modified again.
        let map = if read_only {
            Mapping::ReadOnly(unsafe { Mmap::map(&file) }?)
        } else {
            Mapping::Writable(unsafe { MmapMut::map_mut(&file) }?)
        };

        let header: PageHeader = bytemuck::pod_read_unaligned(&map.bytes()[..PAGE_HEADER_SIZE]);
        if header.version != PAGE_VERSION {
            return Err(Error::corruption(format!(
                "{}: unsupported page version {}",
                path.display(),
                header.version
            )));
        }
        if header.size != len || header.write_pos > records_in(len) {
            return Err(Error::corruption(format!(
                "{}: header size {} / write_pos {} do not match file length {len}",
                path.display(),
                header.size,
                header.write_pos
            )));
        }
        if check_open && header.is_open() {
            return Err(Error::already_open(path.display().to_string()));
        }
        if !read_only && header.is_open() {
            tempo_warn!(
                "Page {} was not closed cleanly, reopening for write",
                path.display()
            );
        }

        let mut page = Self {
            path: path.to_path_buf(),
            map,
            header,
            index: Index::new(index_path(path)),
        };
        if !read_only {
            page.header.set_open(true);
            page.write_header()?;
        }
        Ok(page)
    }

    /// Copy the typed header into the mapped file
    fn write_header(&mut self) -> Result<()> {
        let header = self.header;
        let bytes = self.bytes_mut()?;
        bytes[..PAGE_HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        Ok(())
    }

    fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.map {
            Mapping::Writable(map) => Ok(&mut map[..]),
            Mapping::ReadOnly(_) => Err(Error::invalid_input(format!(
                "{} is opened read-only",
                self.path.display()
            ))),
        }
    }

    /// Copy `run` into the slots starting at `pos`
    #[allow(clippy::cast_possible_truncation)]
    fn write_slots(&mut self, pos: u64, run: &[Meas]) -> Result<()> {
        let start = PAGE_HEADER_SIZE + pos as usize * MEAS_SIZE;
        let end = start + run.len() * MEAS_SIZE;
        let bytes = self.bytes_mut()?;
        bytes[start..end].copy_from_slice(bytemuck::cast_slice(run));
        Ok(())
    }

    /// Written records in slot order
    #[allow(clippy::cast_possible_truncation)]
    pub fn records(&self) -> &[Meas] {
        let end = PAGE_HEADER_SIZE + self.header.write_pos as usize * MEAS_SIZE;
        // The mapping is page aligned and PAGE_HEADER_SIZE is a multiple of
        // Meas alignment; write_pos was validated against the file length.
        bytemuck::cast_slice(&self.map.bytes()[PAGE_HEADER_SIZE..end])
    }

    /// Append one measurement; `false` when the page is full
    ///
    /// # Errors
    ///
    /// Returns an error if the page is read-only or the index write fails.
    pub fn append(&mut self, value: &Meas) -> Result<bool> {
        if self.is_full() {
            return Ok(false);
        }
        Ok(self.append_batch(slice::from_ref(value))? == 1)
    }

    /// Append the prefix of `batch` that fits; returns the number written
    ///
    /// The whole run is described by a single index record.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is read-only or the index write fails.
    pub fn append_batch(&mut self, batch: &[Meas]) -> Result<usize> {
        let room = usize::try_from(self.capacity()).unwrap_or(usize::MAX);
        let to_write = room.min(batch.len());
        if to_write == 0 {
            return Ok(0);
        }

        let run = &batch[..to_write];
        let pos = self.header.write_pos;
        self.write_slots(pos, run)?;
        for value in run {
            self.header.update_min_max(value);
        }
        if let Some(rec) = IndexRecord::for_run(pos, run) {
            self.index.write_index_rec(&rec)?;
        }
        self.header.write_pos += to_write as u64;
        self.write_header()?;
        Ok(to_write)
    }

    /// Record at `slot`, or `None` past the write position
    pub fn read(&self, slot: u64) -> Option<Meas> {
        let slot = usize::try_from(slot).ok()?;
        self.records().get(slot).copied()
    }

    /// Every written record
    pub fn read_all(&self) -> Vec<Meas> {
        self.records().to_vec()
    }

    /// Records with `from <= time <= to` that pass `filter`
    ///
    /// # Errors
    ///
    /// Returns `Error::ReadInterval` if the index points past the written
    /// slots, or an I/O error if the index cannot be read.
    pub fn read_interval(&self, filter: &QueryFilter, from: Time, to: Time) -> Result<Vec<Meas>> {
        let mut result = Vec::new();
        for run in self.plan_interval(filter, from, to)? {
            self.scan_run(&run, filter, from, to, &mut result)?;
        }
        Ok(result)
    }

    /// Unfiltered interval read
    ///
    /// # Errors
    ///
    /// Same as [`Page::read_interval`].
    pub fn read_interval_all(&self, from: Time, to: Time) -> Result<Vec<Meas>> {
        self.read_interval(&QueryFilter::all(), from, to)
    }

    /// Turn the page into a run-by-run interval cursor
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn into_reader(self, filter: QueryFilter, from: Time, to: Time) -> Result<PageReader> {
        PageReader::new(self, filter, from, to)
    }

    /// Decide which slots an interval read has to visit
    pub(crate) fn plan_interval(
        &self,
        filter: &QueryFilter,
        from: Time,
        to: Time,
    ) -> Result<VecDeque<ScanRun>> {
        let mut runs = VecDeque::new();
        if !self.header.min_max_initialized() || self.header.write_pos == 0 {
            return Ok(runs);
        }

        // [from ... minTime, maxTime ... to]
        if self.header.inside_interval(from, to) {
            runs.push_back(ScanRun {
                slots: 0..self.header.write_pos,
                filtered: !filter.is_unfiltered(),
            });
            return Ok(runs);
        }

        for rec in self.index.find_in_index(filter.id_range(), from, to)? {
            // Appended after this handle's header snapshot.
            if rec.pos >= self.header.write_pos {
                continue;
            }
            runs.push_back(ScanRun {
                slots: rec.pos..rec.end(),
                filtered: true,
            });
        }
        Ok(runs)
    }

    /// Scan one planned run into `dest`
    pub(crate) fn scan_run(
        &self,
        run: &ScanRun,
        filter: &QueryFilter,
        from: Time,
        to: Time,
        dest: &mut Vec<Meas>,
    ) -> Result<()> {
        if !run.filtered {
            dest.extend_from_slice(self.records());
            return Ok(());
        }

        for slot in run.slots.clone() {
            let value = self.read(slot).ok_or_else(|| {
                Error::read_interval(format!(
                    "file name: {} slot: {slot} writePos: {} size: {}",
                    self.path.display(),
                    self.header.write_pos,
                    self.header.size
                ))
            })?;
            if in_interval(from, to, value.time) && filter.matches(&value) {
                dest.push(value);
            }
        }
        Ok(())
    }

    /// Newest-first view of the written slots
    pub fn write_window(&self) -> WriteWindow<'_> {
        WriteWindow {
            records: self.records(),
        }
    }

    /// Latest value of every id in `ids` found in this page
    ///
    /// Found ids are removed from `ids`.
    pub fn read_cur_values(&self, ids: &mut HashSet<Id>) -> Vec<Meas> {
        let mut result = Vec::new();
        for value in self.write_window() {
            if ids.is_empty() {
                break;
            }
            if ids.remove(&value.id) {
                result.push(*value);
            }
        }
        result
    }

    /// Stored header (a snapshot for read-only handles)
    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// Smallest time appended
    pub fn min_time(&self) -> Time {
        self.header.min_time
    }

    /// Largest time appended
    pub fn max_time(&self) -> Time {
        self.header.max_time
    }

    /// File size in bytes
    pub fn size(&self) -> u64 {
        self.header.size
    }

    /// Total number of slots
    pub fn max_records(&self) -> u64 {
        records_in(self.header.size)
    }

    /// Slots still free
    pub fn capacity(&self) -> u64 {
        self.max_records().saturating_sub(self.header.write_pos)
    }

    /// No further record fits
    pub fn is_full(&self) -> bool {
        self.capacity() == 0
    }

    /// Page file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index file path
    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Handle cannot write
    pub fn is_read_only(&self) -> bool {
        matches!(self.map, Mapping::ReadOnly(_))
    }

    /// Compare the stored checksum with the written records
    pub fn verify_checksum(&self) -> bool {
        let records: &[u8] = bytemuck::cast_slice(self.records());
        calculate_page_checksum(records, self.header.write_pos) == self.header.checksum
    }

    /// Store the checksum, clear the open marker and flush to disk
    ///
    /// No-op for read-only handles and pages already closed.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the mapping or the index fails.
    pub fn close(&mut self) -> Result<()> {
        if self.is_read_only() || !self.header.is_open() {
            return Ok(());
        }

        let records: &[u8] = bytemuck::cast_slice(self.records());
        self.header.checksum = calculate_page_checksum(records, self.header.write_pos);
        self.header.set_open(false);
        self.write_header()?;
        if let Mapping::Writable(map) = &self.map {
            map.flush()?;
        }
        self.index.sync()?;
        tempo_debug!(
            "Closed page {} with {} records",
            self.path.display(),
            self.header.write_pos
        );
        Ok(())
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tempo_error!("Failed to close page {}: {e}", self.path.display());
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("path", &self.path)
            .field("read_only", &self.is_read_only())
            .field("header", &self.header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::{meas, TempDir};

    fn page_size(records: u64) -> u64 {
        PAGE_HEADER_SIZE as u64 + records * MEAS_SIZE as u64
    }

    #[test]
    fn test_create_initializes_header() {
        let dir = TempDir::new().unwrap();
        let page = Page::create(dir.file_path("a.page"), page_size(4)).unwrap();

        let header = *page.header();
        assert_eq!(header.version, PAGE_VERSION);
        assert_eq!(header.size, page_size(4));
        assert_eq!(header.write_pos, 0);
        assert!(header.is_open());
        assert!(!header.min_max_initialized());
        assert_eq!(page.capacity(), 4);
        assert!(page.index_path().exists());
    }

    #[test]
    fn test_create_rejects_tiny_size() {
        let dir = TempDir::new().unwrap();
        let err = Page::create(dir.file_path("a.page"), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_append_until_full() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(2) + 39).unwrap();

        assert!(page.append(&meas(1, 10)).unwrap());
        assert!(page.append(&meas(2, 20)).unwrap());
        assert!(page.is_full());
        assert!(!page.append(&meas(3, 30)).unwrap());
        assert_eq!(page.header().write_pos, 2);
        assert_eq!(page.read(1), Some(meas(2, 20)));
        assert_eq!(page.read(2), None);
    }

    #[test]
    fn test_append_batch_writes_prefix() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(3)).unwrap();

        let batch = [meas(5, 3), meas(1, 1), meas(9, 2), meas(4, 4)];
        assert_eq!(page.append_batch(&batch).unwrap(), 3);
        assert_eq!(page.append_batch(&batch).unwrap(), 0);

        let header = *page.header();
        assert_eq!((header.min_time, header.max_time), (1, 3));
        assert_eq!((header.min_id, header.max_id), (1, 9));
        assert_eq!(page.index.records().unwrap().len(), 1);
    }

    #[test]
    fn test_read_interval_uses_index_runs() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(10)).unwrap();
        page.append_batch(&[meas(1, 1), meas(2, 2)]).unwrap();
        page.append_batch(&[meas(1, 10), meas(2, 11)]).unwrap();
        page.append(&meas(3, 20)).unwrap();

        let plan = page.plan_interval(&QueryFilter::all(), 9, 12).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].slots, 2..4);

        let found = page.read_interval_all(9, 12).unwrap();
        assert_eq!(found, vec![meas(1, 10), meas(2, 11)]);

        let found = page
            .read_interval(&QueryFilter::new(&[2], 0, 0), 0, 100)
            .unwrap();
        assert_eq!(found, vec![meas(2, 2), meas(2, 11)]);
    }

    #[test]
    fn test_read_interval_contained_unfiltered_copies_all() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(4)).unwrap();
        page.append_batch(&[meas(1, 5), meas(2, 6)]).unwrap();

        let plan = page.plan_interval(&QueryFilter::all(), 0, 100).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!plan[0].filtered);
        assert_eq!(page.read_interval_all(0, 100).unwrap(), page.read_all());
    }

    #[test]
    fn test_index_past_write_pos_is_error() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(4)).unwrap();
        page.append(&meas(1, 5)).unwrap();
        page.append(&meas(1, 50)).unwrap();
        // Claim slots that were never written.
        page.index
            .write_index_rec(&IndexRecord {
                min_time: 6,
                max_time: 7,
                min_id: 1,
                max_id: 1,
                count: 3,
                pos: 1,
            })
            .unwrap();

        let err = page.read_interval_all(6, 7).unwrap_err();
        assert!(err.is_read_interval());
    }

    #[test]
    fn test_write_window_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.file_path("a.page"), page_size(4)).unwrap();
        page.append_batch(&[meas(1, 1), meas(2, 2), meas(1, 3)]).unwrap();

        let window = page.write_window();
        assert_eq!(window.len(), 3);
        let times: Vec<Time> = window.iter().map(|m| m.time).collect();
        assert_eq!(times, vec![3, 2, 1]);

        let mut ids: HashSet<Id> = [1, 2, 7].into_iter().collect();
        let cur = page.read_cur_values(&mut ids);
        assert_eq!(cur, vec![meas(1, 3), meas(2, 2)]);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.file_path("a.page");
        {
            let mut page = Page::create(&path, page_size(4)).unwrap();
            page.append(&meas(1, 1)).unwrap();
            page.close().unwrap();
            assert!(!page.header().is_open());
            assert!(page.verify_checksum());
        }

        let mut page = Page::open_checked(&path).unwrap();
        assert!(page.header().is_open());
        assert_eq!(page.read_all(), vec![meas(1, 1)]);
        assert!(page.append(&meas(1, 2)).unwrap());

        let err = Page::open_checked(&path).unwrap_err();
        assert!(err.is_already_open());

        let reader = Page::open(&path, true).unwrap();
        assert!(reader.is_read_only());
        assert_eq!(reader.header().write_pos, 2);
        page.close().unwrap();
    }

    #[test]
    fn test_read_only_cannot_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.file_path("a.page");
        drop(Page::create(&path, page_size(4)).unwrap());

        let mut page = Page::open(&path, true).unwrap();
        assert!(matches!(
            page.append(&meas(1, 1)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_open_rejects_bad_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.file_path("a.page");
        drop(Page::create(&path, page_size(2)).unwrap());

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = 9;
        std::fs::write(&path, bytes).unwrap();
        assert!(Page::open(&path, true).unwrap_err().is_corruption());
    }
}
