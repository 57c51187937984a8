use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Errors surfaced by the table layer.
///
/// Variants carry plain strings so that a status latched on a builder or
/// iterator can be cloned back out of `status()` any number of times.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// On-disk data failed validation: bad varint, bad checksum, bad magic,
    /// malformed internal key.
    #[error("corruption: {0}")]
    Corruption(String),

    /// An underlying I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// A caller broke an API contract that is detectable at runtime.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lookup found nothing. Internal to cache/meta resolution.
    #[error("not found")]
    NotFound,
}

impl Error {
    /// Shorthand for a `Corruption` with a static description.
    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(e: PoisonError<T>) -> Self {
        Error::Io(e.to_string())
    }
}

/// Result alias used throughout the table layer.
pub type Result<T> = std::result::Result<T, Error>;
