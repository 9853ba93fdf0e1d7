//! Engine errors
//!
//! Messages carry the offending path or position as text, so errors stay
//! `Clone` and can be parked by the flush worker until a caller picks them up.

use thiserror::Error as ThisError;

/// Result of tempo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a storage, page or query operation can fail with
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    /// File create, map or open failed
    #[error("I/O error: {0}")]
    Io(String),
    /// Page header still carries the open marker
    #[error("Page already open: {0}")]
    AlreadyOpen(String),
    /// Storage directory or page not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Index metadata points past the written data of a page
    #[error("Read interval error: {0}")]
    ReadInterval(String),
    /// Page or metadata file corruption detected
    #[error("Storage corruption: {0}")]
    Corruption(String),
    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Internal engine error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Corruption(err.to_string())
    }
}

impl Error {
    /// Create an I/O error
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Error::Io(msg.into())
    }

    /// Create an error for a page still marked open
    pub fn already_open<S: Into<String>>(msg: S) -> Self {
        Error::AlreadyOpen(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an index/data desynchronisation error
    pub fn read_interval<S: Into<String>>(msg: S) -> Self {
        Error::ReadInterval(msg.into())
    }

    /// Create a corruption error
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this is an I/O error
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Check if a page was still marked open
    pub fn is_already_open(&self) -> bool {
        matches!(self, Error::AlreadyOpen(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Index and page data disagree; the page needs repair
    pub fn is_read_interval(&self) -> bool {
        matches!(self, Error::ReadInterval(_))
    }

    /// Check if this is a corruption error
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    /// The storage stays usable after this error
    ///
    /// Desynchronized or corrupt pages keep failing until repaired, and
    /// internal errors mean a worker thread is gone.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Io(_) | Error::AlreadyOpen(_) | Error::InvalidInput(_) | Error::NotFound(_) => {
                true
            }
            Error::ReadInterval(_) | Error::Corruption(_) | Error::Internal(_) => false,
        }
    }
}
