//! Read-only, range-oriented HDF5 reader.
//!
//! [`read`] extracts a single dataset (optionally a row subrange and one
//! column) from a `file://` or `s3://` resource. The file is never loaded
//! whole: the format walker issues minimal ranged reads through a two-tier
//! block cache, and parsed dataset metadata is memoized process-wide so
//! repeated reads skip the object-header walk entirely.
//!
//! ```no_run
//! use rangehdf5::{read, ValueType, ALL_ROWS};
//!
//! let info = read(
//!     "file:///data/granule.h5",
//!     "/gt1l/heights/h_ph",
//!     ValueType::Real,
//!     0,
//!     0,
//!     ALL_ROWS,
//!     None,
//! )?;
//! assert_eq!(info.datasize, info.elements * 8);
//! # Ok::<(), rangehdf5::Error>(())
//! ```

pub mod dataset;
pub mod error;
pub mod meta_repo;

use std::sync::Arc;

use rangehdf5_format::{MetaWalker, Superblock};
use rangehdf5_io::{open_url, RangeReader};

pub use dataset::{DatasetInfo, NumericKind, ValueType, ALL_ROWS};
pub use error::Error;
pub use meta_repo::MetaRepo;
pub use rangehdf5_io::IoContext;

/// Read one dataset from the resource at `url`.
///
/// `num_rows == ALL_ROWS` reads every row. When the dataset has more than
/// one column, `column` selects which one to keep. `val_type` requests
/// element-wise coercion ([`ValueType::Integer`] → `i32`,
/// [`ValueType::Real`] → `f64`); `Dynamic` and `Text` return the native
/// bytes. Passing a shared [`IoContext`] lets concurrent reads of the same
/// file share one block cache; with `None`, a context local to this call is
/// used.
pub fn read(
    url: &str,
    dataset: &str,
    val_type: ValueType,
    column: u64,
    start_row: u64,
    num_rows: i64,
    context: Option<Arc<IoContext>>,
) -> Result<DatasetInfo, Error> {
    read_impl(url, dataset, val_type, column, start_row, num_rows, context).map_err(|e| {
        Error::Dataset {
            name: dataset.to_string(),
            source: Box::new(e),
        }
    })
}

fn read_impl(
    url: &str,
    dataset: &str,
    val_type: ValueType,
    column: u64,
    start_row: u64,
    num_rows: i64,
    context: Option<Arc<IoContext>>,
) -> Result<DatasetInfo, Error> {
    let (driver, resource) = open_url(url)?;
    let context = context.unwrap_or_else(|| Arc::new(IoContext::new()));
    let reader = RangeReader::new(driver, context);

    let name = meta_repo::meta_name(&resource, dataset);
    let key = meta_repo::meta_key(&name);

    let memoized = key.and_then(|k| MetaRepo::global().lookup(k, &name));
    let (meta, fresh_parse) = match memoized {
        Some(meta) => (meta, false),
        None => {
            let superblock = Superblock::read(&reader)?;
            let walker = MetaWalker::new(
                &reader,
                dataset,
                superblock.offset_size,
                superblock.length_size,
            );
            (walker.resolve(superblock.root_group_address)?, true)
        }
    };

    let num_rows = dataset::resolve_rows(&meta, start_row, num_rows)?;
    let mut info = dataset::read_dataset(&reader, &meta, start_row, num_rows)?;

    // The parse is only proven good once the dataset bytes came out of it.
    if fresh_parse {
        if let Some(k) = key {
            MetaRepo::global().publish(k, &name, meta);
        }
    }

    if info.numcols > 1 {
        dataset::select_column(&mut info, column)?;
    }
    dataset::translate(&mut info, val_type)?;

    tracing::debug!(
        url,
        dataset,
        elements = info.elements,
        bytes = info.datasize,
        rows = info.numrows,
        cols = info.numcols,
        backend_reads = reader.context().read_requests(),
        "dataset read"
    );

    Ok(info)
}

/// Open the resource at `url` and walk to `start_group`, reporting whether
/// the path resolves. Errors are logged rather than propagated.
pub fn traverse(url: &str, start_group: &str) -> bool {
    match traverse_impl(url, start_group) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(url, start_group, error = %e, "traverse failed");
            false
        }
    }
}

fn traverse_impl(url: &str, start_group: &str) -> Result<(), Error> {
    let (driver, _resource) = open_url(url)?;
    let reader = RangeReader::new(driver, Arc::new(IoContext::new()));
    let superblock = Superblock::read(&reader)?;
    let walker = MetaWalker::new(
        &reader,
        start_group,
        superblock.offset_size,
        superblock.length_size,
    );
    walker.resolve(superblock.root_group_address)?;
    Ok(())
}
