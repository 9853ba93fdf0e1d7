//! Asynchronous flush of full caches into pages

use crate::cache::buffer::Cache;
use crate::cache::pool::CachePool;
use crate::common::error::{Error, Result};
use crate::common::logging::Timer;
use crate::common::worker::AsyncWorker;
use crate::query::cur_values::CurrentValueIndex;
use crate::storage::page_manager::PageManager;
use crate::types::Meas;
use crate::{tempo_error, tempo_trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const SLOW_FLUSH: Duration = Duration::from_millis(100);

/// Single-consumer flusher: caches are written to pages in submission order
pub struct CacheWriter {
    worker: AsyncWorker<Cache>,
    pool: Arc<CachePool>,
    pages: Arc<Mutex<PageManager>>,
    cur_values: Arc<CurrentValueIndex>,
    last_error: Arc<Mutex<Option<Error>>>,
}

impl CacheWriter {
    /// Writer feeding `pages`; flushed caches go back to `pool`
    pub fn new(
        pool: Arc<CachePool>,
        pages: Arc<Mutex<PageManager>>,
        cur_values: Arc<CurrentValueIndex>,
    ) -> Self {
        Self {
            worker: AsyncWorker::new("tempo-cache-writer"),
            pool,
            pages,
            cur_values,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the flush thread
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is running or the thread cannot start.
    pub fn start(&mut self) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        let pages = Arc::clone(&self.pages);
        let cur_values = Arc::clone(&self.cur_values);
        let last_error = Arc::clone(&self.last_error);

        self.worker.start(move |cache: Cache| {
            let timer = Timer::with_threshold(format!("flush {} values", cache.size()), SLOW_FLUSH);
            match flush(&mut pages.lock(), cache.as_array()) {
                Ok(()) => cur_values.write_all(cache.as_array()),
                Err(e) => {
                    tempo_error!("Cache flush failed, {} values lost: {e}", cache.size());
                    *last_error.lock() = Some(e);
                }
            }
            timer.stop();
            pool.release(cache);
        })
    }

    /// Queue a cache for flushing
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the writer is not accepting work.
    pub fn add(&self, mut cache: Cache) -> Result<()> {
        cache.sync_begin();
        tempo_trace!("Queued cache with {} values", cache.size());
        self.worker.add(cache)
    }

    /// A cache is queued or being flushed
    pub fn is_busy(&self) -> bool {
        self.worker.is_busy()
    }

    /// Block until every queued cache is flushed
    pub fn wait_idle(&self) {
        self.worker.wait_idle();
    }

    /// Finish the current flush, then hold the queue
    pub fn pause_work(&self) {
        self.worker.pause_work();
    }

    /// Release the queue held by [`CacheWriter::pause_work`]
    pub fn continue_work(&self) {
        self.worker.continue_work();
    }

    /// Flush everything queued and stop the thread
    ///
    /// # Errors
    ///
    /// Returns the last flush error, or `Error::Internal` if the thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        self.worker.stop()?;
        self.take_error().map_or(Ok(()), Err)
    }

    /// Flush thread is not running
    pub fn is_stopped(&self) -> bool {
        self.worker.is_stopped()
    }

    /// Error of the most recent failed flush, cleared on read
    pub fn take_error(&self) -> Option<Error> {
        self.last_error.lock().take()
    }
}

/// Append `values` to the current page, rotating pages until all are written
fn flush(pages: &mut PageManager, values: &[Meas]) -> Result<()> {
    let mut rest = values;
    while !rest.is_empty() {
        let written = pages.writable_page()?.append_batch(rest)?;
        rest = &rest[written..];
        if !rest.is_empty() {
            pages.create_new_page()?;
        }
    }
    Ok(())
}
