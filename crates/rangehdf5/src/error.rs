//! Error types for the high-level read API.

use std::fmt;

use rangehdf5_format::FormatError;
use rangehdf5_io::IoError;

use crate::dataset::NumericKind;

/// Errors surfaced by dataset reads.
#[derive(Debug)]
pub enum Error {
    /// I/O failure opening or reading the resource.
    Io(IoError),
    /// HDF5 format walking failure.
    Format(FormatError),
    /// The requested rows exceed the dataset's first dimension.
    RowsOutOfRange {
        /// First requested row.
        start_row: u64,
        /// Number of requested rows.
        num_rows: u64,
        /// Rows the dataset actually has.
        rows: u64,
    },
    /// The requested column exceeds the dataset's column count.
    ColumnOutOfRange {
        /// Requested column index.
        column: u64,
        /// Columns the dataset actually has.
        cols: u64,
    },
    /// The dataset carries no usable datatype information.
    MissingDatatype,
    /// Filters are present on a layout that cannot carry them.
    FiltersOnUnchunkedLayout,
    /// The read extends past the bytes allocated on disk.
    ReadExceedsAllocation {
        /// Bytes the read needs.
        needed: u64,
        /// Bytes allocated.
        allocated: u64,
    },
    /// Element-wise conversion to the requested value type is not possible.
    TranslationFailed {
        /// Kind of the native data.
        from: NumericKind,
        /// Native element size in bytes.
        type_size: u64,
    },
    /// Context wrapper naming the dataset that failed.
    Dataset {
        /// Dataset path as requested.
        name: String,
        /// The underlying failure.
        source: Box<Error>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Format(e) => write!(f, "HDF5 format error: {e}"),
            Error::RowsOutOfRange {
                start_row,
                num_rows,
                rows,
            } => {
                write!(
                    f,
                    "read exceeds number of rows: {start_row} + {num_rows} > {rows}"
                )
            }
            Error::ColumnOutOfRange { column, cols } => {
                write!(f, "column {column} out of range: dataset has {cols} columns")
            }
            Error::MissingDatatype => write!(f, "missing datatype information"),
            Error::FiltersOnUnchunkedLayout => {
                write!(f, "filters unsupported on non-chunked layouts")
            }
            Error::ReadExceedsAllocation { needed, allocated } => {
                write!(
                    f,
                    "read exceeds available data: need {needed} bytes, {allocated} allocated"
                )
            }
            Error::TranslationFailed { from, type_size } => {
                write!(
                    f,
                    "data translation failed from {from:?} with element size {type_size}"
                )
            }
            Error::Dataset { name, source } => write!(f, "{source} ({name})"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Format(e) => Some(e),
            Error::Dataset { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}
