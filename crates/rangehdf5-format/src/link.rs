//! HDF5 Link message parsing (message type 0x0006, version 1).

use rangehdf5_io::RangeReader;

use crate::error::FormatError;

/// Longest link name this reader accepts.
const MAX_NAME_LEN: u64 = 512;

// Link message flag bits
const NAME_LEN_WIDTH_MASK: u64 = 0x03;
const CREATION_ORDER_PRESENT: u64 = 0x04;
const LINK_TYPE_PRESENT: u64 = 0x08;
const CHARSET_PRESENT: u64 = 0x10;

/// What a link points at. Only hard links are followed; soft and external
/// links are parsed for their fields and left alone.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// Hard link to an object header address.
    Hard {
        object_header_address: u64,
    },
    /// Soft link carrying a target path within this file.
    Soft {
        target_path: String,
    },
    /// External link carrying a file name and an object path inside it.
    External {
        filename: String,
        object_path: String,
    },
}

/// A parsed Link message.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMessage {
    /// Name of this link.
    pub name: String,
    /// What this link points to.
    pub target: LinkTarget,
    /// Creation order, when tracked.
    pub creation_order: Option<u64>,
}

impl LinkMessage {
    /// Parse a Link message at `pos`, returning the message and the number
    /// of bytes consumed.
    pub fn read(
        reader: &RangeReader,
        pos: u64,
        offset_size: u64,
    ) -> Result<(LinkMessage, u64), FormatError> {
        let start = pos;
        let mut pos = pos;

        let version = reader.read_field(1, &mut pos)?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                structure: "link message",
                version,
            });
        }
        let flags = reader.read_field(1, &mut pos)?;

        let link_type = if flags & LINK_TYPE_PRESENT != 0 {
            reader.read_field(1, &mut pos)?
        } else {
            0 // hard link
        };

        let creation_order = if flags & CREATION_ORDER_PRESENT != 0 {
            Some(reader.read_field(8, &mut pos)?)
        } else {
            None
        };

        if flags & CHARSET_PRESENT != 0 {
            let _charset = reader.read_field(1, &mut pos)?;
        }

        let name_len_width = 1u64 << (flags & NAME_LEN_WIDTH_MASK);
        let name_len = reader.read_field(name_len_width, &mut pos)?;
        if name_len > MAX_NAME_LEN {
            return Err(FormatError::OutOfRange {
                what: "link name length",
                value: name_len,
                limit: MAX_NAME_LEN,
            });
        }
        let name_bytes = reader.read_byte_array(name_len, &mut pos)?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        let target = match link_type {
            0 => {
                let object_header_address = reader.read_field(offset_size, &mut pos)?;
                LinkTarget::Hard {
                    object_header_address,
                }
            }
            1 => {
                let len = reader.read_field(2, &mut pos)?;
                let bytes = reader.read_byte_array(len, &mut pos)?;
                LinkTarget::Soft {
                    target_path: String::from_utf8_lossy(&bytes).into_owned(),
                }
            }
            64 => {
                let len = reader.read_field(2, &mut pos)?;
                let bytes = reader.read_byte_array(len, &mut pos)?;
                // flags(1) + null-terminated file name + null-terminated path
                let body = bytes.get(1..).unwrap_or(&[]);
                let mut parts = body.split(|&b| b == 0);
                let filename = String::from_utf8_lossy(parts.next().unwrap_or(&[])).into_owned();
                let object_path =
                    String::from_utf8_lossy(parts.next().unwrap_or(&[])).into_owned();
                LinkTarget::External {
                    filename,
                    object_path,
                }
            }
            other => {
                return Err(FormatError::OutOfRange {
                    what: "link type",
                    value: other,
                    limit: 64,
                })
            }
        };

        Ok((
            LinkMessage {
                name,
                target,
                creation_order,
            },
            pos - start,
        ))
    }
}
