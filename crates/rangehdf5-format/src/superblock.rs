//! HDF5 superblock parsing (version 0 only).

use rangehdf5_io::RangeReader;

use crate::error::FormatError;
use crate::signature;

/// Parsed HDF5 superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Size of file offsets in bytes (4 or 8).
    pub offset_size: u64,
    /// Size of lengths in bytes (4 or 8).
    pub length_size: u64,
    /// Group leaf node K.
    pub group_leaf_node_k: u16,
    /// Group internal node K.
    pub group_internal_node_k: u16,
    /// Root group object header address.
    pub root_group_address: u64,
}

impl Superblock {
    /// Read and validate the superblock at the start of the resource.
    ///
    /// Only version 0 is supported: the signature, the superblock version and
    /// the free-space / root-table / header-message versions must all check
    /// out. Offset and length sizes sit at bytes 13 and 14; the root group
    /// object header address is read at byte 64 with `offset_size`.
    pub fn read(reader: &RangeReader) -> Result<Superblock, FormatError> {
        let mut pos = 0u64;

        let file_signature = reader.read_field(8, &mut pos)?;
        if file_signature != signature::H5_FILE {
            return Err(FormatError::BadSignature {
                structure: "superblock",
                found: file_signature,
            });
        }

        for structure in [
            "superblock",
            "free space storage",
            "root group symbol table",
            "shared header message",
        ] {
            let version = reader.read_field(1, &mut pos)?;
            if version != 0 {
                return Err(FormatError::UnsupportedVersion { structure, version });
            }
        }

        pos = 13;
        let offset_size = reader.read_field(1, &mut pos)?;
        let length_size = reader.read_field(1, &mut pos)?;
        if !matches!(offset_size, 4 | 8) {
            return Err(FormatError::InvalidOffsetSize(offset_size));
        }
        if !matches!(length_size, 4 | 8) {
            return Err(FormatError::InvalidLengthSize(length_size));
        }

        pos = 16;
        let group_leaf_node_k = reader.read_field(2, &mut pos)? as u16;
        let group_internal_node_k = reader.read_field(2, &mut pos)? as u16;

        pos = 64;
        let root_group_address = reader.read_field(offset_size, &mut pos)?;

        tracing::debug!(
            offset_size,
            length_size,
            root_group_address = format_args!("{root_group_address:#x}"),
            "superblock parsed"
        );

        Ok(Superblock {
            offset_size,
            length_size,
            group_leaf_node_k,
            group_internal_node_k,
            root_group_address,
        })
    }
}
