//! Chunk B-tree walking: v1 type-1 nodes, request-range intersection, and
//! the per-chunk read pipeline.

use rangehdf5_io::{RangeReader, L1_LINE_SIZE};

use crate::error::FormatError;
use crate::filters::{inflate_chunk, shuffle_chunk};
use crate::meta::DatasetMeta;
use crate::signature;

/// One key of a v1 raw-data-chunk B-tree.
struct ChunkKey {
    chunk_size: u64,
    slices: [u64; crate::meta::MAX_NDIMS],
}

/// Walks a dataset's chunk B-tree for one row range, decoding overlapping
/// chunks into the output buffer.
pub struct ChunkWalker<'r> {
    reader: &'r RangeReader,
    meta: &'r DatasetMeta,
    start_row: u64,
    num_rows: u64,
    chunk_buffer: Vec<u8>,
    /// Read-size hint for chunk fetches. Starts at the full output size and
    /// drops to one L1 line once a prefetch has the range cached.
    size_hint: u64,
}

impl std::fmt::Debug for ChunkWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkWalker")
            .field("start_row", &self.start_row)
            .field("num_rows", &self.num_rows)
            .field("size_hint", &self.size_hint)
            .finish()
    }
}

impl<'r> ChunkWalker<'r> {
    /// Create a walker for `[start_row, start_row + num_rows)`.
    pub fn new(
        reader: &'r RangeReader,
        meta: &'r DatasetMeta,
        start_row: u64,
        num_rows: u64,
    ) -> Result<Self, FormatError> {
        if meta.element_size != meta.type_size {
            return Err(FormatError::DecodeFailed(format!(
                "chunk element size {} does not match datatype size {}",
                meta.element_size, meta.type_size
            )));
        }
        if meta.chunk_elements == 0 {
            return Err(FormatError::DecodeFailed(
                "chunked layout with zero chunk elements".into(),
            ));
        }
        let chunk_buffer_size = (meta.chunk_elements * meta.type_size) as usize;
        Ok(Self {
            reader,
            meta,
            start_row,
            num_rows,
            chunk_buffer: vec![0u8; chunk_buffer_size],
            size_hint: 0,
        })
    }

    /// Fill `buffer` (the output for the requested rows, whose first byte is
    /// at dataset offset `buffer_offset`) from the chunk B-tree.
    pub fn read_into(&mut self, buffer: &mut [u8], buffer_offset: u64) -> Result<(), FormatError> {
        if buffer.is_empty() || self.num_rows == 0 {
            return Ok(());
        }

        let buffer_size = buffer.len() as u64;
        self.size_hint = buffer_size;

        // When the slice starts in the first half of the data, one upstream
        // read from the tree root past the end of the slice costs at most 2x
        // the data wanted and collapses the per-chunk fetches that follow.
        if buffer_offset < buffer_size {
            let mut addr = self.meta.address;
            let (_, cached) =
                self.reader
                    .request_cached(0, &mut addr, buffer_offset + buffer_size)?;
            if cached {
                self.size_hint = L1_LINE_SIZE;
            }
        }

        self.walk_node(self.meta.address, buffer, buffer_offset)
    }

    fn walk_node(
        &mut self,
        node_addr: u64,
        buffer: &mut [u8],
        buffer_offset: u64,
    ) -> Result<(), FormatError> {
        let os = self.meta.offset_size;
        let data_key1 = self.start_row;
        let data_key2 = self.start_row + self.num_rows - 1;

        let mut pos = node_addr;
        let sig = self.reader.read_field(4, &mut pos)?;
        if sig != signature::TREE {
            return Err(FormatError::BadSignature {
                structure: "chunk b-tree",
                found: sig,
            });
        }
        let node_type = self.reader.read_field(1, &mut pos)?;
        if node_type != 1 {
            return Err(FormatError::UnsupportedFeature(
                "non-raw-data-chunk b-tree node",
            ));
        }
        let node_level = self.reader.read_field(1, &mut pos)?;
        let entries_used = self.reader.read_field(2, &mut pos)?;
        pos += 2 * os; // sibling addresses

        let mut curr_key = self.read_key(&mut pos)?;

        for _ in 0..entries_used {
            let child_addr = self.reader.read_field(os, &mut pos)?;
            let next_key = self.read_key(&mut pos)?;

            let child_key1 = curr_key.slices[0];
            // A zero key terminates the tree; it stands for the row bound.
            let child_key2 = if next_key.chunk_size == 0 && self.meta.ndims > 0 {
                self.meta.dimensions[0]
            } else {
                next_key.slices[0]
            };

            let overlaps = (data_key1 >= child_key1 && data_key1 < child_key2)
                || (data_key2 >= child_key1 && data_key2 < child_key2)
                || (child_key1 >= data_key1 && child_key1 <= data_key2)
                || (child_key2 > data_key1 && child_key2 < data_key2);

            if overlaps {
                if node_level > 0 {
                    self.walk_node(child_addr, buffer, buffer_offset)?;
                } else {
                    self.read_chunk(&curr_key, child_addr, buffer, buffer_offset)?;
                }
            }

            curr_key = next_key;
        }

        Ok(())
    }

    fn read_key(&self, pos: &mut u64) -> Result<ChunkKey, FormatError> {
        let chunk_size = self.reader.read_field(4, pos)?;
        let _filter_mask = self.reader.read_field(4, pos)?;
        let mut slices = [0u64; crate::meta::MAX_NDIMS];
        for slice in slices.iter_mut().take(self.meta.ndims) {
            *slice = self.reader.read_field(8, pos)?;
        }
        let trailing = self.reader.read_field(8, pos)?;
        if self.meta.type_size > 0 && trailing % self.meta.type_size != 0 {
            return Err(FormatError::DecodeFailed(format!(
                "chunk key missing trailing zero: {trailing}"
            )));
        }
        Ok(ChunkKey { chunk_size, slices })
    }

    /// Decode one leaf chunk into its slot of the output buffer.
    fn read_chunk(
        &mut self,
        key: &ChunkKey,
        chunk_addr: u64,
        buffer: &mut [u8],
        buffer_offset: u64,
    ) -> Result<(), FormatError> {
        let meta = self.meta;
        let buffer_size = buffer.len() as u64;
        let chunk_buffer_size = self.chunk_buffer.len() as u64;

        // Flattened byte offset of the chunk's first element.
        let mut chunk_offset = 0u64;
        for i in 0..meta.ndims {
            let mut slice_size = key.slices[i] * meta.type_size;
            for j in i + 1..meta.ndims {
                slice_size *= meta.dimensions[j];
            }
            chunk_offset += slice_size;
        }

        let buffer_index = chunk_offset.saturating_sub(buffer_offset);
        if buffer_index >= buffer_size {
            return Err(FormatError::OutOfRange {
                what: "chunk buffer index",
                value: buffer_index,
                limit: buffer_size,
            });
        }
        let chunk_index = buffer_offset.saturating_sub(chunk_offset);
        if chunk_index >= chunk_buffer_size {
            return Err(FormatError::OutOfRange {
                what: "chunk read index",
                value: chunk_index,
                limit: chunk_buffer_size,
            });
        }
        let chunk_bytes = (chunk_buffer_size - chunk_index).min(buffer_size - buffer_index);

        let out_start = buffer_index as usize;
        let out = &mut buffer[out_start..out_start + chunk_bytes as usize];

        if meta.deflate {
            let mut addr = chunk_addr;
            let (compressed, cached) =
                self.reader
                    .request_cached(key.chunk_size, &mut addr, self.size_hint)?;
            if cached {
                self.size_hint = L1_LINE_SIZE;
            }

            if chunk_bytes == chunk_buffer_size && !meta.shuffle {
                // Whole chunk consumed: inflate straight into the output.
                inflate_chunk(&compressed, out)?;
            } else {
                inflate_chunk(&compressed, &mut self.chunk_buffer)?;
                if meta.shuffle {
                    shuffle_chunk(&self.chunk_buffer, out, chunk_index, meta.type_size)?;
                } else {
                    let start = chunk_index as usize;
                    out.copy_from_slice(&self.chunk_buffer[start..start + out.len()]);
                }
            }
        } else {
            if meta.shuffle {
                return Err(FormatError::UnsupportedFeature(
                    "shuffle filter on uncompressed chunk",
                ));
            }
            if chunk_bytes == chunk_buffer_size && key.chunk_size != chunk_bytes {
                return Err(FormatError::DecodeFailed(format!(
                    "chunk size mismatch: {} != {}",
                    key.chunk_size, chunk_bytes
                )));
            }

            let mut addr = chunk_addr;
            let (data, cached) =
                self.reader
                    .request_cached(key.chunk_size, &mut addr, self.size_hint)?;
            if cached {
                self.size_hint = L1_LINE_SIZE;
            }
            let start = chunk_index as usize;
            let end = start + out.len();
            if end > data.len() {
                return Err(FormatError::OutOfRange {
                    what: "chunk data extent",
                    value: end as u64,
                    limit: data.len() as u64,
                });
            }
            out.copy_from_slice(&data[start..end]);
        }

        tracing::trace!(
            row = key.slices[0],
            bytes = chunk_bytes,
            address = format_args!("{chunk_addr:#x}"),
            "chunk decoded"
        );
        Ok(())
    }
}
