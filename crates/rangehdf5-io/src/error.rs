//! Error types for backend drivers and the ranged-I/O cache.

use std::fmt;
use std::io;

/// Errors that can occur opening a resource or reading byte ranges from it.
#[derive(Debug)]
pub enum IoError {
    /// The URL does not use a recognized scheme (`file://` or `s3://`).
    InvalidUrl(String),
    /// The resource could not be opened.
    OpenFailed {
        /// The resource portion of the URL.
        resource: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A positional read failed below the driver.
    ReadFailed {
        /// File position of the failed read.
        pos: u64,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The backend returned fewer bytes than the firm minimum.
    ShortRead {
        /// Bytes the caller required.
        requested: u64,
        /// Bytes the backend actually returned.
        returned: u64,
        /// File position of the read.
        pos: u64,
    },
    /// The object-store backend returned an error response.
    Http {
        /// HTTP status code.
        status: u16,
        /// Short description of the failure.
        message: String,
    },
    /// A field read was requested with a width outside 1..=8.
    InvalidFieldSize(u64),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            IoError::OpenFailed { resource, source } => {
                write!(f, "failed to open resource {resource}: {source}")
            }
            IoError::ReadFailed { pos, source } => {
                write!(f, "read failed at position {pos:#x}: {source}")
            }
            IoError::ShortRead {
                requested,
                returned,
                pos,
            } => {
                write!(
                    f,
                    "failed to read at least {requested} bytes at {pos:#x}: got {returned}"
                )
            }
            IoError::Http { status, message } => {
                write!(f, "object store error (HTTP {status}): {message}")
            }
            IoError::InvalidFieldSize(size) => write!(f, "invalid field size: {size}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::OpenFailed { source, .. } => Some(source),
            IoError::ReadFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
