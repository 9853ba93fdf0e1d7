//! Common utilities, configuration and error handling for tempo

pub mod config;
pub mod error;
pub mod logging;
pub mod worker;

pub mod test_utils;

pub use config::StorageConfig;
pub use error::{Error, Result};
