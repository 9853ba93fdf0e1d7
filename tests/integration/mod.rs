//! Integration test framework for tempo
//!
//! Shared setup for tests that drive a whole storage directory.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use tempo::common::test_utils::{init_test_logging, TempDir};
use tempo::common::{Error, Result};
use tempo::storage::page_constants::{MEAS_SIZE, PAGE_HEADER_SIZE};
use tempo::storage::page_io;
use tempo::storage::PageInfo;
use tempo::{Storage, StorageConfig};
use std::path::{Path, PathBuf};

/// Page size holding exactly `records` measurements
pub fn page_size_for(records: usize) -> u64 {
    (PAGE_HEADER_SIZE + records * MEAS_SIZE) as u64
}

/// Integration test environment
pub struct TestEnvironment {
    /// Temporary directory for test files
    pub temp_dir: TempDir,
    /// Storage directory within the temp directory
    pub db_path: PathBuf,
}

impl TestEnvironment {
    /// Create a new test environment
    pub fn new() -> Result<Self> {
        init_test_logging();

        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.tempo");

        Ok(Self { temp_dir, db_path })
    }

    /// Storage directory
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create a store whose pages hold `records` measurements
    pub fn create_storage(&self, records: usize) -> Result<Storage> {
        Storage::create(&self.db_path, page_size_for(records))
    }

    /// Create a store with explicit cache settings
    pub fn create_storage_with(
        &self,
        records: usize,
        cache_pool_size: usize,
        cache_size: usize,
    ) -> Result<Storage> {
        let config = StorageConfig {
            page_size: page_size_for(records),
            cache_pool_size,
            cache_size,
            ..StorageConfig::default()
        };
        Storage::create_with_config(&self.db_path, config)
    }

    /// Page files in the storage directory, sorted by name
    pub fn page_files(&self) -> Result<Vec<PathBuf>> {
        page_io::ls(&self.db_path, "page")
    }

    /// Headers of every page, sorted by name
    pub fn page_infos(&self) -> Result<Vec<PageInfo>> {
        self.page_files()?
            .into_iter()
            .map(|path| {
                let header = page_io::read_header(&path)?;
                Ok(PageInfo { path, header })
            })
            .collect()
    }
}

/// Helper for testing error conditions
pub struct ErrorTester;

impl ErrorTester {
    /// Assert that `func` fails with an error accepted by `expected_predicate`
    pub fn assert_error_type<T: std::fmt::Debug, F>(func: F, expected_predicate: fn(&Error) -> bool)
    where
        F: FnOnce() -> Result<T>,
    {
        match func() {
            Ok(value) => panic!("Expected error, got {value:?}"),
            Err(error) => assert!(
                expected_predicate(&error),
                "Error type mismatch. Got: {error:?}"
            ),
        }
    }

    /// Assert a `NotFound` error
    pub fn assert_not_found<T: std::fmt::Debug, F>(func: F)
    where
        F: FnOnce() -> Result<T>,
    {
        Self::assert_error_type(func, Error::is_not_found);
    }

    /// Assert a `Corruption` error
    pub fn assert_corruption<T: std::fmt::Debug, F>(func: F)
    where
        F: FnOnce() -> Result<T>,
    {
        Self::assert_error_type(func, Error::is_corruption);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creation() {
        let env = TestEnvironment::new().expect("Should create test environment");

        assert!(env.temp_dir.path().is_dir());
        assert!(!env.db_path().exists());
        assert_eq!(env.db_path().file_name().unwrap(), "test.tempo");
    }

    #[test]
    fn test_create_storage_lays_out_directory() {
        let env = TestEnvironment::new().unwrap();
        let storage = env.create_storage(4).unwrap();

        assert!(env.db_path().join("storage.meta").exists());
        assert!(env.page_files().unwrap().is_empty());
        drop(storage);
    }

    #[test]
    fn test_error_tester() {
        ErrorTester::assert_not_found(|| -> Result<()> { Err(Error::not_found("x")) });
        ErrorTester::assert_corruption(|| -> Result<()> { Err(Error::corruption("x")) });
    }
}
