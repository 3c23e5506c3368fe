//! Cursor-based ranged reader: the single entry point parsers use to pull
//! bytes through the cache.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::cache::{CacheEntry, IoContext};
use crate::driver::IoDriver;
use crate::error::IoError;

/// Reads byte ranges and fixed-width little-endian fields through the
/// two-tier cache, advancing a caller-held cursor.
pub struct RangeReader {
    driver: Box<dyn IoDriver>,
    context: Arc<IoContext>,
}

impl RangeReader {
    /// Create a reader over a backend driver and a (possibly shared) context.
    pub fn new(driver: Box<dyn IoDriver>, context: Arc<IoContext>) -> Self {
        Self { driver, context }
    }

    /// The I/O context this reader reads through.
    pub fn context(&self) -> &Arc<IoContext> {
        &self.context
    }

    /// Fetch `size` bytes at `*pos` and advance the cursor.
    ///
    /// `hint` enlarges the backend read on a cache miss; the extra bytes are
    /// cached for subsequent requests. Returns a copy of exactly the
    /// requested range.
    pub fn request(&self, size: u64, pos: &mut u64, hint: u64) -> Result<Vec<u8>, IoError> {
        self.request_cached(size, pos, hint).map(|(data, _)| data)
    }

    /// Like [`request`](Self::request) but also reports whether the call
    /// performed (and cached) a fresh backend read.
    pub fn request_cached(
        &self,
        size: u64,
        pos: &mut u64,
        hint: u64,
    ) -> Result<(Vec<u8>, bool), IoError> {
        let file_pos = *pos;

        if let Some(data) = self.context.probe(size, file_pos) {
            *pos += size;
            return Ok((data, false));
        }

        // Miss: read outside the lock, over-reading up to the hint.
        let read_size = size.max(hint);
        let mut data = vec![0u8; read_size as usize];
        let got = self.driver.read(&mut data, file_pos)?;
        if (got as u64) < size {
            return Err(IoError::ShortRead {
                requested: size,
                returned: got as u64,
                pos: file_pos,
            });
        }
        data.truncate(got);

        let out = data[..size as usize].to_vec();
        self.context.store(CacheEntry {
            pos: file_pos,
            data,
        });

        *pos += size;
        Ok((out, true))
    }

    /// Read a little-endian unsigned integer of `size` bytes (1..=8) into a
    /// `u64`, advancing the cursor.
    pub fn read_field(&self, size: u64, pos: &mut u64) -> Result<u64, IoError> {
        if size == 0 || size > 8 {
            return Err(IoError::InvalidFieldSize(size));
        }
        let data = self.request(size, pos, 0)?;
        Ok(match size {
            1 => data[0] as u64,
            n => LittleEndian::read_uint(&data, n as usize),
        })
    }

    /// Read `size` raw bytes, advancing the cursor.
    pub fn read_byte_array(&self, size: u64, pos: &mut u64) -> Result<Vec<u8>, IoError> {
        self.request(size, pos, 0)
    }
}
