//! Pool of reusable caches shared by producers and the writer

use crate::cache::buffer::Cache;
use crate::common::error::{Error, Result};
use crate::tempo_debug;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct PoolState {
    free: Vec<Cache>,
    /// Caches alive, free or handed out
    allocated: usize,
    pool_size: usize,
    cache_size: usize,
    dynamic: bool,
}

impl PoolState {
    fn take(&mut self) -> Option<Cache> {
        if let Some(cache) = self.free.pop() {
            return Some(cache);
        }
        if self.dynamic {
            self.allocated += 1;
            tempo_debug!("Cache pool grew to {} caches", self.allocated);
            return Some(Cache::new(self.cache_size));
        }
        None
    }
}

/// Fixed or growable set of caches
///
/// A cache handed out by [`CachePool::get_cache`] stays out of the pool until
/// it is given back through [`CachePool::release`].
#[derive(Debug)]
pub struct CachePool {
    state: Mutex<PoolState>,
    released: Condvar,
}

impl CachePool {
    /// Pre-allocate `pool_size` caches of `cache_size` measurements
    pub fn new(pool_size: usize, cache_size: usize) -> Self {
        let free = (0..pool_size).map(|_| Cache::new(cache_size)).collect();
        Self {
            state: Mutex::new(PoolState {
                free,
                allocated: pool_size,
                pool_size,
                cache_size,
                dynamic: false,
            }),
            released: Condvar::new(),
        }
    }

    /// A free cache, a newly grown one when dynamic sizing is on, or `None`
    pub fn get_cache(&self) -> Option<Cache> {
        self.state.lock().take()
    }

    /// Block until a cache is available
    pub fn wait_cache(&self) -> Cache {
        let mut state = self.state.lock();
        loop {
            if let Some(cache) = state.take() {
                return cache;
            }
            self.released.wait(&mut state);
        }
    }

    /// Give a cache back after its flush
    ///
    /// The cache is cleared, re-allocated if the cache size changed meanwhile
    /// and dropped if the pool is above its configured size.
    pub fn release(&self, mut cache: Cache) {
        let mut state = self.state.lock();
        if state.allocated > state.pool_size {
            state.allocated -= 1;
        } else {
            if cache.capacity() == state.cache_size {
                cache.clear();
            } else {
                cache = Cache::new(state.cache_size);
            }
            state.free.push(cache);
        }
        self.released.notify_all();
    }

    /// Grow instead of blocking when the pool runs dry
    pub fn enable_dynamic_size(&self, enabled: bool) {
        self.state.lock().dynamic = enabled;
        self.released.notify_all();
    }

    /// Dynamic sizing is on
    pub fn dynamic_size(&self) -> bool {
        self.state.lock().dynamic
    }

    /// Configured number of caches
    pub fn pool_size(&self) -> usize {
        self.state.lock().pool_size
    }

    /// Change the number of caches; surplus caches in use are dropped on release
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a size of zero.
    pub fn set_pool_size(&self, pool_size: usize) -> Result<()> {
        if pool_size == 0 {
            return Err(Error::invalid_input("cache pool size must be positive"));
        }
        let mut state = self.state.lock();
        state.pool_size = pool_size;
        while state.allocated < pool_size {
            let cache = Cache::new(state.cache_size);
            state.free.push(cache);
            state.allocated += 1;
        }
        while state.allocated > pool_size && state.free.pop().is_some() {
            state.allocated -= 1;
        }
        self.released.notify_all();
        Ok(())
    }

    /// Capacity of newly allocated caches
    pub fn cache_size(&self) -> usize {
        self.state.lock().cache_size
    }

    /// Change the capacity of caches; caches in use keep theirs until released
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a size of zero.
    pub fn set_cache_size(&self, cache_size: usize) -> Result<()> {
        if cache_size == 0 {
            return Err(Error::invalid_input("cache size must be positive"));
        }
        let mut state = self.state.lock();
        state.cache_size = cache_size;
        for cache in &mut state.free {
            if cache.capacity() != cache_size {
                *cache = Cache::new(cache_size);
            }
        }
        Ok(())
    }

    /// Caches currently waiting in the pool
    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }
}
