//! Fractal heap walking for v2 group link storage.
//!
//! The heap header describes a doubling table; the root block is either a
//! single direct block or an indirect block enumerating direct and indirect
//! children. Direct blocks hold link messages packed back-to-back, ending at
//! a zero lead-byte sentinel. Filtered heaps are parsed through the header
//! and then refused.

use crate::error::FormatError;
use crate::meta::is_undefined;
use crate::object_header::MetaWalker;
use crate::signature;

const FRHP_CHECKSUM_DIRECT_BLOCKS: u64 = 0x02;

/// Doubling-table geometry extracted from the heap header.
struct HeapInfo {
    table_width: u64,
    curr_num_rows: u64,
    starting_blk_size: u64,
    max_dblk_size: u64,
    blk_offset_size: u64,
    dblk_checksum: bool,
}

impl HeapInfo {
    /// Block size for a doubling-table row: the starting size for rows 0 and
    /// 1, doubling from row 2 on.
    fn row_block_size(&self, row: u64) -> u64 {
        if row <= 1 {
            self.starting_blk_size
        } else {
            self.starting_blk_size * (1u64 << (row - 1))
        }
    }
}

/// Position of the highest set bit; 0 for an input of 0.
fn highest_bit(value: u64) -> u64 {
    if value == 0 {
        0
    } else {
        63 - value.leading_zeros() as u64
    }
}

impl MetaWalker<'_> {
    /// Walk the fractal heap rooted at `pos`, streaming link messages to the
    /// path matcher.
    pub(crate) fn read_fractal_heap(
        &mut self,
        pos: u64,
        hdr_flags: u8,
        dlvl: usize,
    ) -> Result<(), FormatError> {
        let os = self.meta.offset_size;
        let ls = self.meta.length_size;

        let mut pos = pos;
        let sig = self.reader.read_field(4, &mut pos)?;
        if sig != signature::FRHP {
            return Err(FormatError::BadSignature {
                structure: "fractal heap",
                found: sig,
            });
        }
        let version = self.reader.read_field(1, &mut pos)?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap",
                version,
            });
        }

        let _heap_id_len = self.reader.read_field(2, &mut pos)?;
        let io_filter_len = self.reader.read_field(2, &mut pos)?;
        let flags = self.reader.read_field(1, &mut pos)?;
        let _max_size_managed = self.reader.read_field(4, &mut pos)?;
        let _next_huge_id = self.reader.read_field(ls, &mut pos)?;
        let _huge_btree_addr = self.reader.read_field(os, &mut pos)?;
        let _free_space = self.reader.read_field(ls, &mut pos)?;
        let _free_space_addr = self.reader.read_field(os, &mut pos)?;
        let _managed_space = self.reader.read_field(ls, &mut pos)?;
        let _allocated_space = self.reader.read_field(ls, &mut pos)?;
        let _dblk_alloc_iter = self.reader.read_field(ls, &mut pos)?;
        let managed_objects = self.reader.read_field(ls, &mut pos)?;
        let _huge_size = self.reader.read_field(ls, &mut pos)?;
        let _huge_count = self.reader.read_field(ls, &mut pos)?;
        let _tiny_size = self.reader.read_field(ls, &mut pos)?;
        let _tiny_count = self.reader.read_field(ls, &mut pos)?;
        let table_width = self.reader.read_field(2, &mut pos)?;
        let starting_blk_size = self.reader.read_field(ls, &mut pos)?;
        let max_dblk_size = self.reader.read_field(ls, &mut pos)?;
        let max_heap_size = self.reader.read_field(2, &mut pos)?;
        let _start_num_rows = self.reader.read_field(2, &mut pos)?;
        let root_blk_addr = self.reader.read_field(os, &mut pos)?;
        let curr_num_rows = self.reader.read_field(2, &mut pos)?;

        tracing::debug!(
            table_width,
            starting_blk_size,
            curr_num_rows,
            managed_objects,
            "fractal heap header"
        );

        if io_filter_len > 0 {
            // The filtered-root fields are still read so the refusal happens
            // with the header fully decoded.
            let _filtered_root_size = self.reader.read_field(ls, &mut pos)?;
            let _filter_mask = self.reader.read_field(4, &mut pos)?;
            return Err(FormatError::UnsupportedFeature("filtered fractal heap"));
        }

        let _checksum = self.reader.read_field(4, &mut pos)?;

        let heap = HeapInfo {
            table_width,
            curr_num_rows,
            starting_blk_size,
            max_dblk_size,
            blk_offset_size: max_heap_size.div_ceil(8),
            dblk_checksum: flags & FRHP_CHECKSUM_DIRECT_BLOCKS != 0,
        };

        if heap.curr_num_rows == 0 {
            self.read_direct_block(&heap, heap.starting_blk_size, root_blk_addr, hdr_flags, dlvl)?;
        } else {
            self.read_indirect_block(&heap, 0, root_blk_addr, hdr_flags, dlvl)?;
        }
        Ok(())
    }

    /// Scan one direct block's link messages until the block is exhausted or
    /// a zero lead byte marks the end of the used region.
    fn read_direct_block(
        &mut self,
        heap: &HeapInfo,
        block_size: u64,
        pos: u64,
        hdr_flags: u8,
        dlvl: usize,
    ) -> Result<(), FormatError> {
        let _ = hdr_flags;
        let mut pos = pos;

        let sig = self.reader.read_field(4, &mut pos)?;
        if sig != signature::FHDB {
            return Err(FormatError::BadSignature {
                structure: "fractal heap direct block",
                found: sig,
            });
        }
        let version = self.reader.read_field(1, &mut pos)?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap direct block",
                version,
            });
        }

        pos += self.meta.offset_size + heap.blk_offset_size;
        if heap.dblk_checksum {
            pos += 4;
        }

        let prefix = 5 + self.meta.offset_size + heap.blk_offset_size
            + if heap.dblk_checksum { 4 } else { 0 };
        let mut data_left = block_size.saturating_sub(prefix);

        while data_left > 0 {
            // Peek for a zero lead: the used region of the block has ended.
            let peek_size = (1u64 << highest_bit(data_left)).min(8);
            let mut peek_pos = pos;
            if self.reader.read_field(peek_size, &mut peek_pos)? == 0 {
                break;
            }

            let consumed = self.handle_link_msg(pos, dlvl)?;
            if consumed > data_left {
                return Err(FormatError::OutOfRange {
                    what: "link message size",
                    value: consumed,
                    limit: data_left,
                });
            }
            pos += consumed;
            data_left -= consumed;

            if self.found_level > dlvl {
                break; // dataset found below this block
            }
        }

        Ok(())
    }

    /// Walk one indirect block, visiting direct and indirect children in
    /// doubling-table order.
    fn read_indirect_block(
        &mut self,
        heap: &HeapInfo,
        block_size: u64,
        pos: u64,
        hdr_flags: u8,
        dlvl: usize,
    ) -> Result<(), FormatError> {
        let os = self.meta.offset_size;

        let mut pos = pos;
        let sig = self.reader.read_field(4, &mut pos)?;
        if sig != signature::FHIB {
            return Err(FormatError::BadSignature {
                structure: "fractal heap indirect block",
                found: sig,
            });
        }
        let version = self.reader.read_field(1, &mut pos)?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                structure: "fractal heap indirect block",
                version,
            });
        }

        pos += os + heap.blk_offset_size;

        // Row count: the header's value for the root block, derived from the
        // block size for nested indirect blocks.
        let nrows = if block_size > 0 {
            highest_bit(block_size) - highest_bit(heap.starting_blk_size * heap.table_width) + 1
        } else {
            heap.curr_num_rows
        };

        for row in 0..nrows {
            let row_block_size = heap.row_block_size(row);
            for _ in 0..heap.table_width {
                let child_addr = self.reader.read_field(os, &mut pos)?;
                if is_undefined(child_addr, os) || dlvl < self.found_level {
                    continue;
                }
                if row_block_size <= heap.max_dblk_size {
                    self.read_direct_block(heap, row_block_size, child_addr, hdr_flags, dlvl)?;
                } else {
                    self.read_indirect_block(heap, row_block_size, child_addr, hdr_flags, dlvl)?;
                }
            }
        }

        let _checksum = self.reader.read_field(4, &mut pos)?;
        Ok(())
    }
}
