//! Byte-image builders shared by the unit tests in this crate.
//!
//! Every builder appends an 8-aligned structure to a growing file image and
//! returns its address, so tests can assemble exactly the on-disk shapes the
//! walker expects without a writer library.

use crate::object_header::{
    DATASPACE_MSG, DATATYPE_MSG, DATA_LAYOUT_MSG, LINK_INFO_MSG, SYMBOL_TABLE_MSG,
};

const UNDEF: u64 = u64::MAX;

/// Pad the image to the next 8-byte boundary and return the new end address.
pub fn align(image: &mut Vec<u8>) -> u64 {
    while image.len() % 8 != 0 {
        image.push(0);
    }
    image.len() as u64
}

/// Append a v1-framed message (type, declared size, flags, reserved,
/// payload padded to 8 bytes).
pub fn push_v1_message(buf: &mut Vec<u8>, msg_type: u16, payload: &[u8]) {
    let mut padded = payload.to_vec();
    while padded.len() % 8 != 0 {
        padded.push(0);
    }
    buf.extend_from_slice(&msg_type.to_le_bytes());
    buf.extend_from_slice(&(padded.len() as u16).to_le_bytes());
    buf.push(0); // flags
    buf.extend_from_slice(&[0u8; 3]); // reserved
    buf.extend_from_slice(&padded);
}

/// Append a v1 object header holding the given messages. Returns its address.
pub fn object_header_v1(image: &mut Vec<u8>, messages: &[(u16, Vec<u8>)]) -> u64 {
    let mut msg_bytes = Vec::new();
    for (msg_type, payload) in messages {
        push_v1_message(&mut msg_bytes, *msg_type, payload);
    }

    let addr = align(image);
    image.push(1); // version
    image.push(0); // reserved
    image.extend_from_slice(&(messages.len() as u16).to_le_bytes());
    image.extend_from_slice(&1u32.to_le_bytes()); // reference count
    image.extend_from_slice(&(msg_bytes.len() as u64).to_le_bytes()); // header size
    image.extend_from_slice(&msg_bytes);
    addr
}

/// Append a v2 object header (2-byte chunk-0 size, no timestamps).
/// Returns its address.
pub fn object_header_v2(image: &mut Vec<u8>, messages: &[(u16, Vec<u8>)]) -> u64 {
    let mut msg_bytes = Vec::new();
    for (msg_type, payload) in messages {
        msg_bytes.push(*msg_type as u8);
        msg_bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        msg_bytes.push(0); // flags
        msg_bytes.extend_from_slice(payload);
    }

    let addr = align(image);
    image.extend_from_slice(b"OHDR");
    image.push(2); // version
    image.push(0x01); // flags: 2-byte chunk-0 size
    image.extend_from_slice(&(msg_bytes.len() as u16).to_le_bytes());
    image.extend_from_slice(&msg_bytes);
    image.extend_from_slice(&0u32.to_le_bytes()); // checksum (read, not checked)
    addr
}

/// Dataspace message payload (version 1).
pub fn dataspace_msg(dims: &[u64]) -> Vec<u8> {
    let mut buf = vec![1, dims.len() as u8, 0]; // version, rank, flags
    buf.extend_from_slice(&[0u8; 5]); // reserved
    for &d in dims {
        buf.extend_from_slice(&d.to_le_bytes());
    }
    buf
}

/// Datatype message payload (version 1) for the given class and size.
pub fn datatype_msg(class: u8, size: u32) -> Vec<u8> {
    let version_class = (1u32 << 4) | class as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(&version_class.to_le_bytes());
    buf.extend_from_slice(&size.to_le_bytes());
    match class {
        0 => buf.extend_from_slice(&[0u8; 4]),  // fixed-point properties
        1 => buf.extend_from_slice(&[0u8; 12]), // floating-point properties
        _ => {}
    }
    buf
}

/// Fill-value message payload (version 2) with a defined fill.
pub fn fill_value_msg(fill: &[u8]) -> Vec<u8> {
    let mut buf = vec![2, 0, 0, 1]; // version, times, defined
    buf.extend_from_slice(&(fill.len() as u32).to_le_bytes());
    buf.extend_from_slice(fill);
    buf
}

/// Contiguous data-layout message payload (version 3).
pub fn layout_contiguous_msg(address: u64, size: u64) -> Vec<u8> {
    let mut buf = vec![3, 1];
    buf.extend_from_slice(&address.to_le_bytes());
    buf.extend_from_slice(&size.to_le_bytes());
    buf
}

/// Compact data-layout message payload (version 3) with inline data.
pub fn layout_compact_msg(data: &[u8]) -> Vec<u8> {
    let mut buf = vec![3, 0];
    buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Chunked data-layout message payload (version 3).
pub fn layout_chunked_msg(btree_address: u64, chunk_dims: &[u32], element_size: u32) -> Vec<u8> {
    let mut buf = vec![3, 2, chunk_dims.len() as u8 + 1];
    buf.extend_from_slice(&btree_address.to_le_bytes());
    for &d in chunk_dims {
        buf.extend_from_slice(&d.to_le_bytes());
    }
    buf.extend_from_slice(&element_size.to_le_bytes());
    buf
}

/// Filter-pipeline message payload (version 1) with SHUFFLE and/or DEFLATE.
pub fn filter_msg(deflate: bool, shuffle: bool) -> Vec<u8> {
    let mut filters = Vec::new();
    if shuffle {
        filters.extend_from_slice(&2u16.to_le_bytes()); // id
        filters.extend_from_slice(&0u16.to_le_bytes()); // name length
        filters.extend_from_slice(&0u16.to_le_bytes()); // flags
        filters.extend_from_slice(&0u16.to_le_bytes()); // client values
    }
    if deflate {
        filters.extend_from_slice(&1u16.to_le_bytes());
        filters.extend_from_slice(&0u16.to_le_bytes());
        filters.extend_from_slice(&0u16.to_le_bytes());
        filters.extend_from_slice(&1u16.to_le_bytes());
        filters.extend_from_slice(&6u32.to_le_bytes()); // level
        filters.extend_from_slice(&[0u8; 4]); // odd client count padding
    }

    let count = shuffle as u8 + deflate as u8;
    let mut buf = vec![1, count];
    buf.extend_from_slice(&[0u8; 6]); // reserved
    buf.extend_from_slice(&filters);
    buf
}

/// Symbol-table message payload.
pub fn symbol_table_msg(btree_address: u64, heap_address: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&btree_address.to_le_bytes());
    buf.extend_from_slice(&heap_address.to_le_bytes());
    buf
}

/// Link-info message payload (version 0) pointing at a fractal heap.
pub fn link_info_msg(heap_address: u64) -> Vec<u8> {
    let mut buf = vec![0, 0]; // version, flags
    buf.extend_from_slice(&heap_address.to_le_bytes());
    buf.extend_from_slice(&UNDEF.to_le_bytes()); // name index b-tree
    buf
}

/// Hard-link message bytes (version 1, 1-byte name length).
pub fn hard_link_msg(name: &str, object_header_address: u64) -> Vec<u8> {
    let mut buf = vec![1, 0, name.len() as u8];
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&object_header_address.to_le_bytes());
    buf
}

/// Append a local heap whose data segment holds the given names
/// nul-terminated. Returns (heap header address, name offsets).
pub fn local_heap(image: &mut Vec<u8>, names: &[&str]) -> (u64, Vec<u64>) {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for name in names {
        offsets.push(data.len() as u64);
        data.extend_from_slice(name.as_bytes());
        data.push(0);
    }

    let addr = align(image);
    let data_addr = addr + 32; // header: 8 + 2*8 + 8
    image.extend_from_slice(b"HEAP");
    image.push(0); // version
    image.extend_from_slice(&[0u8; 3]); // reserved
    image.extend_from_slice(&(data.len() as u64).to_le_bytes()); // segment size
    image.extend_from_slice(&UNDEF.to_le_bytes()); // free list head
    image.extend_from_slice(&data_addr.to_le_bytes());
    image.extend_from_slice(&data);
    (addr, offsets)
}

/// Append a symbol-table node for the given (name offset, header address)
/// pairs. Returns its address.
pub fn snod(image: &mut Vec<u8>, entries: &[(u64, u64)]) -> u64 {
    let addr = align(image);
    image.extend_from_slice(b"SNOD");
    image.push(1); // version
    image.push(0); // reserved
    image.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(name_offset, header_addr) in entries {
        image.extend_from_slice(&name_offset.to_le_bytes());
        image.extend_from_slice(&header_addr.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes()); // cache type
        image.extend_from_slice(&0u32.to_le_bytes()); // reserved
        image.extend_from_slice(&[0u8; 16]); // scratch pad
    }
    addr
}

/// Append a group B-tree leaf over the given symbol-table nodes, chained to
/// `right_sibling`. Returns its address.
pub fn group_btree_leaf(image: &mut Vec<u8>, snod_addrs: &[u64], right_sibling: u64) -> u64 {
    let addr = align(image);
    image.extend_from_slice(b"TREE");
    image.push(0); // node type: group
    image.push(0); // level: leaf
    image.extend_from_slice(&(snod_addrs.len() as u16).to_le_bytes());
    image.extend_from_slice(&UNDEF.to_le_bytes()); // left sibling
    image.extend_from_slice(&right_sibling.to_le_bytes());
    image.extend_from_slice(&0u64.to_le_bytes()); // key 0
    for (i, &snod_addr) in snod_addrs.iter().enumerate() {
        image.extend_from_slice(&snod_addr.to_le_bytes());
        image.extend_from_slice(&(i as u64 + 1).to_le_bytes()); // next key
    }
    addr
}

/// Append a v1 group (local heap + SNOD + B-tree + object header) holding
/// the named children. Returns the group's object header address.
pub fn v1_group(image: &mut Vec<u8>, children: &[(&str, u64)]) -> u64 {
    let names: Vec<&str> = children.iter().map(|&(n, _)| n).collect();
    let (heap_addr, offsets) = local_heap(image, &names);
    let entries: Vec<(u64, u64)> = offsets
        .iter()
        .zip(children.iter())
        .map(|(&off, &(_, hdr))| (off, hdr))
        .collect();
    let snod_addr = snod(image, &entries);
    let btree_addr = group_btree_leaf(image, &[snod_addr], UNDEF);
    object_header_v1(
        image,
        &[(SYMBOL_TABLE_MSG, symbol_table_msg(btree_addr, heap_addr))],
    )
}

/// Append a fractal heap whose root is a single direct block containing
/// hard-link messages for the given children. Returns the heap header
/// address.
pub fn fractal_heap_direct(image: &mut Vec<u8>, children: &[(&str, u64)]) -> u64 {
    let starting_blk_size = 512u64;
    let max_heap_size = 16u16; // bits; block offsets are 2 bytes

    // Direct block first so the header can point at it.
    let dblock_addr = align(image);
    image.extend_from_slice(b"FHDB");
    image.push(0); // version
    image.extend_from_slice(&0u64.to_le_bytes()); // heap header address (back-pointer)
    image.extend_from_slice(&0u16.to_le_bytes()); // block offset
    for &(name, hdr) in children {
        let link = hard_link_msg(name, hdr);
        image.extend_from_slice(&link);
    }
    let used = image.len() as u64 - dblock_addr;
    for _ in used..starting_blk_size {
        image.push(0); // zero sentinel ends the message scan
    }

    fractal_heap_header(image, dblock_addr, starting_blk_size, max_heap_size, 0)
}

/// Append a fractal heap header. `curr_rows == 0` means the root block is a
/// direct block of `starting_blk_size` bytes. Returns the header address.
pub fn fractal_heap_header(
    image: &mut Vec<u8>,
    root_block_addr: u64,
    starting_blk_size: u64,
    max_heap_size: u16,
    curr_rows: u16,
) -> u64 {
    let addr = align(image);
    image.extend_from_slice(b"FRHP");
    image.push(0); // version
    image.extend_from_slice(&7u16.to_le_bytes()); // heap id length
    image.extend_from_slice(&0u16.to_le_bytes()); // io filter encoded length
    image.push(0); // flags: no direct-block checksums
    image.extend_from_slice(&0u32.to_le_bytes()); // max managed object size
    image.extend_from_slice(&0u64.to_le_bytes()); // next huge object id
    image.extend_from_slice(&UNDEF.to_le_bytes()); // huge objects b-tree
    image.extend_from_slice(&0u64.to_le_bytes()); // free space
    image.extend_from_slice(&UNDEF.to_le_bytes()); // free space manager
    image.extend_from_slice(&0u64.to_le_bytes()); // managed space
    image.extend_from_slice(&0u64.to_le_bytes()); // allocated managed space
    image.extend_from_slice(&0u64.to_le_bytes()); // direct block iterator offset
    image.extend_from_slice(&(1u64).to_le_bytes()); // managed object count
    image.extend_from_slice(&0u64.to_le_bytes()); // huge objects size
    image.extend_from_slice(&0u64.to_le_bytes()); // huge objects count
    image.extend_from_slice(&0u64.to_le_bytes()); // tiny objects size
    image.extend_from_slice(&0u64.to_le_bytes()); // tiny objects count
    image.extend_from_slice(&4u16.to_le_bytes()); // table width
    image.extend_from_slice(&starting_blk_size.to_le_bytes());
    image.extend_from_slice(&1024u64.to_le_bytes()); // max direct block size
    image.extend_from_slice(&max_heap_size.to_le_bytes());
    image.extend_from_slice(&2u16.to_le_bytes()); // starting rows in root indirect block
    image.extend_from_slice(&root_block_addr.to_le_bytes());
    image.extend_from_slice(&curr_rows.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes()); // checksum
    addr
}

/// Append a v2 group (fractal heap + object header with a link-info
/// message). Returns the group's object header address.
pub fn v2_group(image: &mut Vec<u8>, children: &[(&str, u64)]) -> u64 {
    let heap_addr = fractal_heap_direct(image, children);
    object_header_v2(image, &[(LINK_INFO_MSG, link_info_msg(heap_addr))])
}

/// A chunk B-tree key for `ndims` dataset dimensions.
pub struct ChunkEntry {
    pub chunk_size: u32,
    pub slices: Vec<u64>,
    pub address: u64,
}

/// Append a chunk B-tree node at the given level. Leaf children are chunk
/// addresses; internal children are node addresses. The final key is a zero
/// terminator. Returns the node address.
pub fn chunk_btree_node(image: &mut Vec<u8>, level: u8, ndims: usize, entries: &[ChunkEntry]) -> u64 {
    let addr = align(image);
    image.extend_from_slice(b"TREE");
    image.push(1); // node type: raw data chunks
    image.push(level);
    image.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    image.extend_from_slice(&UNDEF.to_le_bytes()); // left sibling
    image.extend_from_slice(&UNDEF.to_le_bytes()); // right sibling
    for entry in entries {
        image.extend_from_slice(&entry.chunk_size.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        for d in 0..ndims {
            image.extend_from_slice(&entry.slices.get(d).copied().unwrap_or(0).to_le_bytes());
        }
        image.extend_from_slice(&0u64.to_le_bytes()); // element dimension
        image.extend_from_slice(&entry.address.to_le_bytes());
    }
    // zero terminator key
    image.extend_from_slice(&0u32.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes());
    for _ in 0..ndims + 1 {
        image.extend_from_slice(&0u64.to_le_bytes());
    }
    addr
}

/// Simple dataset header builders used by several test modules.
pub fn dataset_header_contiguous(
    image: &mut Vec<u8>,
    dims: &[u64],
    class: u8,
    type_size: u32,
    address: u64,
    size: u64,
) -> u64 {
    object_header_v1(
        image,
        &[
            (DATASPACE_MSG, dataspace_msg(dims)),
            (DATATYPE_MSG, datatype_msg(class, type_size)),
            (DATA_LAYOUT_MSG, layout_contiguous_msg(address, size)),
        ],
    )
}
