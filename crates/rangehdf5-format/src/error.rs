//! Error types for HDF5 format parsing.

use std::fmt;

use rangehdf5_io::IoError;

/// Errors that can occur walking HDF5 binary-format structures.
#[derive(Debug)]
pub enum FormatError {
    /// I/O failure from the ranged reader.
    Io(IoError),
    /// A structure signature did not match.
    BadSignature {
        /// Which structure was being parsed.
        structure: &'static str,
        /// The value actually found.
        found: u64,
    },
    /// A structure version is outside the supported subset.
    UnsupportedVersion {
        /// Which structure was being parsed.
        structure: &'static str,
        /// The version found.
        version: u64,
    },
    /// A format feature outside the supported subset was encountered.
    UnsupportedFeature(&'static str),
    /// A filter other than DEFLATE or SHUFFLE is present.
    UnsupportedFilter(u64),
    /// Invalid offset size (must be 4 or 8).
    InvalidOffsetSize(u64),
    /// Invalid length size (must be 4 or 8).
    InvalidLengthSize(u64),
    /// A computed offset or extent fell outside its container.
    OutOfRange {
        /// What was out of range.
        what: &'static str,
        /// The offending value.
        value: u64,
        /// The limit it violated.
        limit: u64,
    },
    /// Chunk decoding failed (zlib failure or size mismatch).
    DecodeFailed(String),
    /// The dataset path could not be resolved.
    DatasetNotFound(String),
    /// A header message consumed a different number of bytes than declared.
    MessageSizeMismatch {
        /// Raw message type identifier.
        msg_type: u16,
        /// Bytes the parser consumed.
        read: u64,
        /// Bytes the message header declared.
        declared: u64,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "I/O error: {e}"),
            FormatError::BadSignature { structure, found } => {
                write!(f, "invalid {structure} signature: {found:#x}")
            }
            FormatError::UnsupportedVersion { structure, version } => {
                write!(f, "unsupported {structure} version: {version}")
            }
            FormatError::UnsupportedFeature(what) => {
                write!(f, "unsupported feature: {what}")
            }
            FormatError::UnsupportedFilter(id) => {
                write!(f, "unsupported filter id: {id}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 4 or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 4 or 8)")
            }
            FormatError::OutOfRange { what, value, limit } => {
                write!(f, "{what} out of range: {value} > {limit}")
            }
            FormatError::DecodeFailed(msg) => write!(f, "decode failed: {msg}"),
            FormatError::DatasetNotFound(path) => write!(f, "dataset not found: {path}"),
            FormatError::MessageSizeMismatch {
                msg_type,
                read,
                declared,
            } => {
                write!(
                    f,
                    "message type {msg_type:#06x} consumed {read} bytes, declared {declared}"
                )
            }
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for FormatError {
    fn from(e: IoError) -> Self {
        FormatError::Io(e)
    }
}
