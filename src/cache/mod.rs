//! Write path: bounded caches, their pool and the background flusher

pub mod buffer;
pub mod pool;
pub mod writer;

pub use buffer::{AppendResult, Cache};
pub use pool::CachePool;
pub use writer::CacheWriter;
