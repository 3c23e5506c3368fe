//! HDF5 binary-format walker for the rangehdf5 reader.
//!
//! Parses exactly the structures needed to locate one dataset and its bytes:
//! superblock v0, object headers v1/v2 with their message streams, v1 group
//! symbol tables, v2 group fractal heaps, and v1 chunk B-trees. Every read
//! goes through the ranged-I/O cache; the file is never loaded whole.

pub mod chunk_btree;
pub mod error;
pub mod filters;
pub mod fractal_heap;
pub mod group;
pub mod link;
pub mod meta;
pub mod object_header;
pub mod signature;
pub mod superblock;

#[cfg(test)]
pub(crate) mod test_builders;

pub use chunk_btree::ChunkWalker;
pub use error::FormatError;
pub use meta::{DataType, DatasetMeta, Layout, MAX_NDIMS};
pub use object_header::MetaWalker;
pub use superblock::Superblock;
