//! Storage façade: ingestion through the cache pipeline, queries over pages
//!
//! Appends land in the active cache under one write lock. A full cache is
//! handed to the background [`CacheWriter`] and replaced from the pool.
//! Interval queries flush the active cache, wait for the writer to drain,
//! capture the page list while the writer is paused and return a
//! [`StorageReader`] that scans pages without holding any lock.

use crate::cache::{AppendResult, Cache, CachePool, CacheWriter};
use crate::common::config::StorageConfig;
use crate::common::error::{Error, Result};
use crate::common::logging::Timer;
use crate::query::{select_pages, CurrentValueIndex, StorageReader};
use crate::storage::page::Page;
use crate::storage::page_io;
use crate::storage::page_manager::PageManager;
use crate::types::{Flag, Id, Meas, QueryFilter, Time};
use crate::{tempo_debug, tempo_error, tempo_info, tempo_warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct WriteState {
    cache: Cache,
    past_time: Time,
}

/// Time-series store rooted in one directory
pub struct Storage {
    path: PathBuf,
    config: StorageConfig,
    write: Mutex<WriteState>,
    pool: Arc<CachePool>,
    pages: Arc<Mutex<PageManager>>,
    cur_values: Arc<CurrentValueIndex>,
    writer: CacheWriter,
    closed: bool,
}

impl Storage {
    /// Create an empty store in `path` with pages of `page_size` bytes
    ///
    /// Anything already at `path` is removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a page size that cannot hold a
    /// record, or an I/O error if the directory cannot be prepared.
    pub fn create<P: AsRef<Path>>(path: P, page_size: u64) -> Result<Self> {
        Self::create_with_config(path, StorageConfig::with_page_size(page_size))
    }

    /// Create an empty store in `path` with a full configuration
    ///
    /// # Errors
    ///
    /// Same as [`Storage::create`].
    pub fn create_with_config<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;
        page_io::rm(path)?;
        fs::create_dir_all(path)?;
        config.save(path)?;
        tempo_info!("Created storage in {}", path.display());
        Self::start(path, config)
    }

    /// Open an existing store and resume writing into its latest page
    ///
    /// A store without a saved configuration is opened with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `path` is not a directory,
    /// `Error::AlreadyOpen` if open checks are enabled and the latest page
    /// still carries its open marker, or the I/O errors of opening pages.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::not_found(format!("{} not exists", path.display())));
        }
        let config = match StorageConfig::load(path) {
            Ok(config) => config,
            Err(e) if e.is_not_found() => {
                tempo_warn!("No saved configuration in {}, using defaults", path.display());
                StorageConfig::default()
            }
            Err(e) => return Err(e),
        };

        let storage = Self::start(path, config)?;
        storage.resume_latest_page()?;
        tempo_info!("Opened storage in {}", path.display());
        Ok(storage)
    }

    fn start(path: &Path, config: StorageConfig) -> Result<Self> {
        let pool = Arc::new(CachePool::new(config.cache_pool_size, config.cache_size));
        pool.enable_dynamic_size(config.dynamic_cache_size);
        let cache = pool.wait_cache();
        let pages = Arc::new(Mutex::new(PageManager::start(path, &config)?));
        let cur_values = Arc::new(CurrentValueIndex::new());
        let mut writer = CacheWriter::new(
            Arc::clone(&pool),
            Arc::clone(&pages),
            Arc::clone(&cur_values),
        );
        writer.start()?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
            write: Mutex::new(WriteState { cache, past_time: 0 }),
            pool,
            pages,
            cur_values,
            writer,
            closed: false,
        })
    }

    fn resume_latest_page(&self) -> Result<()> {
        let mut pages = self.pages.lock();
        let latest = match pages.latest_page() {
            Ok(latest) => latest,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        {
            let snapshot = Page::open(&latest, true)?;
            if !snapshot.header().is_open() && !snapshot.verify_checksum() {
                tempo_warn!("Checksum mismatch in {}", latest.display());
            }
            self.cur_values.load_from_page(&snapshot);
        }
        pages.resume(&latest)?;
        Ok(())
    }

    /// Flush pending writes, stop the writer and close the current page
    ///
    /// The current cache settings are saved with the store. Closing twice is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first flush, page or configuration error encountered.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flushed = {
            let mut state = self.write.lock();
            self.write_cache_locked(&mut state)
        };
        let stopped = self.writer.stop();
        let pages_closed = self.pages.lock().stop();
        flushed?;
        stopped?;
        pages_closed?;

        let config = StorageConfig {
            cache_pool_size: self.pool.pool_size(),
            cache_size: self.pool.cache_size(),
            dynamic_cache_size: self.pool.dynamic_size(),
            ..self.config.clone()
        };
        config.save(&self.path)?;
        tempo_info!("Closed storage in {}", self.path.display());
        Ok(())
    }

    /// Buffer one measurement
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` once the store is closed, or an error if
    /// handing a full cache to the writer fails or a previous flush failed.
    pub fn append(&self, value: &Meas) -> Result<AppendResult> {
        self.ensure_open()?;
        let mut guard = self.write.lock();
        let state = &mut *guard;
        loop {
            let result = state.cache.append(value, state.past_time);
            if result.processed() > 0 {
                if result.ignored > 0 {
                    tempo_debug!(
                        "Ignored value of id {} at {} older than {}",
                        value.id,
                        value.time,
                        state.past_time
                    );
                }
                return Ok(result);
            }
            self.write_cache_locked(state)?;
        }
    }

    /// Buffer a batch, flushing full caches as needed
    ///
    /// # Errors
    ///
    /// Same as [`Storage::append`].
    pub fn append_batch(&self, batch: &[Meas]) -> Result<AppendResult> {
        self.ensure_open()?;
        let mut guard = self.write.lock();
        let state = &mut *guard;
        let mut total = AppendResult::default();
        let mut rest = batch;
        while !rest.is_empty() {
            let step = state.cache.append_batch(rest, state.past_time);
            total += step;
            let processed = usize::try_from(step.processed()).unwrap_or(rest.len());
            rest = &rest[processed.min(rest.len())..];
            if !rest.is_empty() {
                self.write_cache_locked(state)?;
            }
        }
        if total.ignored > 0 {
            tempo_debug!(
                "Ignored {} values older than {}",
                total.ignored,
                state.past_time
            );
        }
        Ok(total)
    }

    /// Hand the active cache to the writer and take a fresh one
    ///
    /// No-op when nothing is buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer rejects the cache or a previous flush
    /// failed.
    pub fn write_cache(&self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.write.lock();
        self.write_cache_locked(&mut state)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::internal(format!(
                "storage {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn write_cache_locked(&self, state: &mut WriteState) -> Result<()> {
        if state.cache.is_empty() {
            return Ok(());
        }
        let full = mem::replace(&mut state.cache, Cache::new(0));
        if let Err(e) = self.writer.add(full) {
            state.cache = self
                .pool
                .get_cache()
                .unwrap_or_else(|| Cache::new(self.pool.cache_size()));
            return Err(e);
        }
        state.cache = self.pool.wait_cache();
        self.writer.take_error().map_or(Ok(()), Err)
    }

    /// Flush everything buffered and wait until it is in pages
    fn sync_locked(&self, state: &mut WriteState) -> Result<()> {
        self.write_cache_locked(state)?;
        self.writer.wait_idle();
        self.writer.take_error().map_or(Ok(()), Err)
    }

    /// Cursor over measurements with `from <= time <= to` matching the ids
    /// (empty = all) and the source and flag tags (zero = any)
    ///
    /// For each id, the latest value at or before `from` is included as well.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` once the store is closed, a pending flush
    /// error or an error listing the pages.
    pub fn read_interval(
        &self,
        ids: &[Id],
        source: Flag,
        flag: Flag,
        from: Time,
        to: Time,
    ) -> Result<StorageReader> {
        self.ensure_open()?;
        let timer = Timer::start("read_interval page selection");
        let pages = {
            let mut state = self.write.lock();
            self.sync_locked(&mut state)?;
            self.writer.pause_work();
            let pages = self.pages.lock().pages_by_time();
            self.writer.continue_work();
            pages?
        };
        let selection = select_pages(&pages, from, to);
        tempo_debug!(
            "Interval [{from}, {to}] selected {} of {} pages",
            selection.pages.len(),
            pages.len()
        );
        timer.stop();
        Ok(StorageReader::new(
            selection,
            QueryFilter::new(ids, source, flag),
            from,
            to,
        ))
    }

    /// [`Storage::read_interval`] without any filter
    ///
    /// # Errors
    ///
    /// Same as [`Storage::read_interval`].
    pub fn read_interval_all(&self, from: Time, to: Time) -> Result<StorageReader> {
        self.read_interval(&[], 0, 0, from, to)
    }

    /// Latest value of each id in `ids`
    ///
    /// Ids without any stored value are logged and left out of the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` once the store is closed, a pending flush
    /// error or an error reading pages.
    pub fn cur_values(&self, ids: &[Id]) -> Result<Vec<Meas>> {
        self.ensure_open()?;
        let mut state = self.write.lock();
        self.sync_locked(&mut state)?;

        let (found, missing) = self.cur_values.read_values(ids);
        if missing.is_empty() {
            return Ok(found);
        }
        self.load_cur_values(&missing)?;

        let (found, missing) = self.cur_values.read_values(ids);
        for id in missing {
            tempo_warn!("Current value for id {id} not found");
        }
        Ok(found)
    }

    /// Search pages newest-first for ids unknown to the current-value index
    fn load_cur_values(&self, missing: &[Id]) -> Result<()> {
        let (Some(lo), Some(hi)) = (missing.iter().min(), missing.iter().max()) else {
            return Ok(());
        };
        let mut wanted: HashSet<Id> = missing.iter().copied().collect();
        let mut pages = self.pages.lock().pages_by_time()?;
        pages.sort_by(|a, b| b.header.max_time.cmp(&a.header.max_time));

        for info in pages.iter().filter(|p| p.header.intersects_ids(*lo, *hi)) {
            if wanted.is_empty() {
                break;
            }
            let page = Page::open(&info.path, true)?;
            let values = page.read_cur_values(&mut wanted);
            self.cur_values.write_all(&values);
        }
        Ok(())
    }

    /// Appends older than this time are ignored
    pub fn past_time(&self) -> Time {
        self.write.lock().past_time
    }

    /// Ignore appends older than `past_time` from now on
    pub fn set_past_time(&self, past_time: Time) {
        self.write.lock().past_time = past_time;
    }

    /// Caches in the pool
    pub fn pool_size(&self) -> usize {
        self.pool.pool_size()
    }

    /// Change the number of caches in the pool
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for zero.
    pub fn set_pool_size(&self, pool_size: usize) -> Result<()> {
        self.pool.set_pool_size(pool_size)
    }

    /// Measurements per cache
    pub fn cache_size(&self) -> usize {
        self.pool.cache_size()
    }

    /// Change the capacity of caches taken from the pool from now on
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for zero.
    pub fn set_cache_size(&self, cache_size: usize) -> Result<()> {
        self.pool.set_cache_size(cache_size)
    }

    /// The pool grows instead of blocking
    pub fn cache_dynamic_size(&self) -> bool {
        self.pool.dynamic_size()
    }

    /// Let the pool grow instead of blocking when it runs dry
    pub fn enable_cache_dynamic_size(&self, enabled: bool) {
        self.pool.enable_dynamic_size(enabled);
    }

    /// Storage directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the store was started with
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Measurements buffered in the active cache
    pub fn buffered(&self) -> usize {
        self.write.lock().cache.size()
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tempo_error!("Failed to close storage {}: {e}", self.path.display());
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
