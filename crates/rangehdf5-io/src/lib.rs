//! Ranged-I/O layer for the rangehdf5 reader.
//!
//! Backends expose one positional read primitive behind [`IoDriver`]; all
//! parser traffic funnels through [`RangeReader`], which fronts the two-tier
//! [`IoContext`] cache so repeated and adjacent sub-reads of the same file
//! region cost one backend round trip.

pub mod cache;
pub mod driver;
pub mod error;
pub mod reader;

pub use cache::{IoContext, L1_LINE_SIZE, L2_LINE_SIZE};
pub use driver::{open_url, FileDriver, IoDriver, MemoryDriver, S3Driver};
pub use error::IoError;
pub use reader::RangeReader;
