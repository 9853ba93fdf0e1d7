//! Test utilities for the tempo storage engine

use crate::common::Result;
use crate::types::{Flag, Id, Meas, Time};
use std::path::{Path, PathBuf};
use std::sync::Once;

static TEST_LOGGER_INIT: Once = Once::new();

/// Route engine logs through the test harness capture
pub fn init_test_logging() {
    TEST_LOGGER_INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_module("tempo", log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    });
}

/// Scratch directory under the system temp dir, removed on drop
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Create a fresh directory
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("tempo-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `filename` inside the directory
    pub fn file_path<S: AsRef<str>>(&self, filename: S) -> PathBuf {
        self.path.join(filename.as_ref())
    }

    /// Write `data` to `filename` inside the directory, returning its path
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    pub fn write_file<S: AsRef<str>>(&self, filename: S, data: &[u8]) -> Result<PathBuf> {
        let path = self.file_path(filename);
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            log::debug!(target: "tempo", "leaving {}: {e}", self.path.display());
        }
    }
}

/// Build a measurement with `value` derived from id and time
#[allow(clippy::cast_precision_loss)]
pub fn meas(id: Id, time: Time) -> Meas {
    Meas::new(id, time, (id * 1000 + time) as f64)
}

/// Build a measurement carrying flag and source tags
pub fn tagged_meas(id: Id, time: Time, flag: Flag, source: Flag) -> Meas {
    Meas {
        flag,
        source,
        ..meas(id, time)
    }
}

/// Generate `count` measurements cycling over `ids` distinct ids, one tick apart
pub fn generate_series(ids: Id, count: u64, start: Time) -> Vec<Meas> {
    (0..count).map(|i| meas(i % ids.max(1), start + i)).collect()
}

/// Sort measurements by (time, id) so results can be compared regardless of order
pub fn sorted(mut values: Vec<Meas>) -> Vec<Meas> {
    values.sort_by_key(|m| (m.time, m.id));
    values
}
