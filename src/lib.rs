//! Tempo - append-mostly time-series storage engine
//!
//! Tempo persists timestamped measurements identified by a numeric id and
//! answers interval and current-value queries with bounded memory:
//! - fixed-size memory-mapped pages with a sparse time/id skip index
//! - bounded write caches drawn from a pool and flushed by one background thread
//! - interval reads stitched across pages with as-of values at the interval start

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

// Core modules
pub mod cache;
pub mod common;
pub mod engine;
pub mod query;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use cache::AppendResult;
pub use common::{Error, Result, StorageConfig};
pub use engine::Storage;
pub use query::StorageReader;
pub use types::{Flag, Id, Meas, QueryFilter, Time, Value};

/// Version information
pub const VERSION_MAJOR: u32 = 0;
/// Version information
pub const VERSION_MINOR: u32 = 1;
/// Version information
pub const VERSION_PATCH: u32 = 0;
/// Version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
