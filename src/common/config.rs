//! Storage configuration, persisted next to the pages as `storage.meta`

use crate::common::error::{Error, Result};
use crate::storage::page_constants::{MEAS_SIZE, PAGE_HEADER_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default page file size (4 MiB)
pub const DEFAULT_PAGE_SIZE: u64 = 4 * 1024 * 1024;

/// Default number of caches in the pool
pub const DEFAULT_CACHE_POOL_SIZE: usize = 4;

/// Default number of measurements one cache holds
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// File name of the persisted configuration inside a storage directory
pub const CONFIG_FILE_NAME: &str = "storage.meta";

/// Tunables of one storage instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Size in bytes of every newly created page file
    pub page_size: u64,
    /// Caches allocated up front by the cache pool
    pub cache_pool_size: usize,
    /// Measurements per cache
    pub cache_size: usize,
    /// Grow the pool instead of waiting when it runs dry
    pub dynamic_cache_size: bool,
    /// Refuse writable opens of pages whose open marker is still set
    pub check_page_open: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_pool_size: DEFAULT_CACHE_POOL_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            dynamic_cache_size: false,
            check_page_open: cfg!(feature = "check-page-open"),
        }
    }
}

impl StorageConfig {
    /// Default configuration with a custom page size
    pub fn with_page_size(page_size: u64) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Check that the configuration can drive a working store
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a page cannot hold a single measurement
    /// or the cache pool would be empty.
    pub fn validate(&self) -> Result<()> {
        let min_page = (PAGE_HEADER_SIZE + MEAS_SIZE) as u64;
        if self.page_size < min_page {
            return Err(Error::invalid_input(format!(
                "page size {} is below the minimum of {min_page} bytes",
                self.page_size
            )));
        }
        if self.cache_pool_size == 0 {
            return Err(Error::invalid_input("cache pool size must be positive"));
        }
        if self.cache_size == 0 {
            return Err(Error::invalid_input("cache size must be positive"));
        }
        Ok(())
    }

    /// Write the configuration into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        fs::write(dir.join(CONFIG_FILE_NAME), bytes)?;
        Ok(())
    }

    /// Read the configuration stored in `dir`
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `dir` holds no configuration file and
    /// `Error::Corruption` if it cannot be decoded.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Err(Error::not_found(path.display().to_string()));
        }
        let bytes = fs::read(&path)?;
        let config: Self = bincode::deserialize(&bytes)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::TempDir;

    #[test]
    fn test_default_is_valid() {
        assert!(StorageConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tiny_page() {
        let config = StorageConfig::with_page_size(PAGE_HEADER_SIZE as u64);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            page_size: 8192,
            cache_pool_size: 2,
            cache_size: 16,
            dynamic_cache_size: true,
            check_page_open: true,
        };
        config.save(dir.path()).unwrap();
        assert_eq!(StorageConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        assert!(StorageConfig::load(dir.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_load_garbage() {
        let dir = TempDir::new().unwrap();
        dir.write_file(CONFIG_FILE_NAME, b"xx").unwrap();
        assert!(StorageConfig::load(dir.path()).unwrap_err().is_corruption());
    }
}
