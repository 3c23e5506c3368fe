//! On-disk signatures of the HDF5 structures this reader walks.
//!
//! Each constant is the little-endian integer value of the signature bytes,
//! matching how the field reader returns multi-byte reads.

/// File signature `\x89HDF\r\n\x1a\n` as a little-endian u64.
pub const H5_FILE: u64 = u64::from_le_bytes(*b"\x89HDF\r\n\x1a\n");

/// Object header v2 prefix.
pub const OHDR: u64 = u32::from_le_bytes(*b"OHDR") as u64;

/// Object header v2 continuation block.
pub const OCHK: u64 = u32::from_le_bytes(*b"OCHK") as u64;

/// Fractal heap header.
pub const FRHP: u64 = u32::from_le_bytes(*b"FRHP") as u64;

/// Fractal heap direct block.
pub const FHDB: u64 = u32::from_le_bytes(*b"FHDB") as u64;

/// Fractal heap indirect block.
pub const FHIB: u64 = u32::from_le_bytes(*b"FHIB") as u64;

/// B-tree v1 node.
pub const TREE: u64 = u32::from_le_bytes(*b"TREE") as u64;

/// Symbol table node.
pub const SNOD: u64 = u32::from_le_bytes(*b"SNOD") as u64;

/// Local heap.
pub const HEAP: u64 = u32::from_le_bytes(*b"HEAP") as u64;
