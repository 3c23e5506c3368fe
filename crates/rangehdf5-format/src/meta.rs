//! Parsed dataset metadata, memoized per (resource, dataset).

/// Maximum number of dataset dimensions this reader handles.
pub const MAX_NDIMS: usize = 4;

/// Filter identification value for DEFLATE.
pub const FILTER_DEFLATE: u64 = 1;

/// Filter identification value for SHUFFLE.
pub const FILTER_SHUFFLE: u64 = 2;

/// HDF5 datatype classes. Only fixed-point and floating-point values can be
/// materialized; the rest surface in metadata and fail on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    FixedPoint,
    FloatingPoint,
    Time,
    String,
    BitField,
    Opaque,
    Compound,
    Reference,
    Enumerated,
    VariableLength,
    Array,
    Unknown,
}

impl DataType {
    /// Map an on-disk datatype class code to a `DataType`.
    pub fn from_class(class: u64) -> DataType {
        match class {
            0 => DataType::FixedPoint,
            1 => DataType::FloatingPoint,
            2 => DataType::Time,
            3 => DataType::String,
            4 => DataType::BitField,
            5 => DataType::Opaque,
            6 => DataType::Compound,
            7 => DataType::Reference,
            8 => DataType::Enumerated,
            9 => DataType::VariableLength,
            10 => DataType::Array,
            _ => DataType::Unknown,
        }
    }
}

/// Dataset storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Compact,
    Contiguous,
    Chunked,
    Unknown,
}

impl Layout {
    /// Map an on-disk layout class code to a `Layout`.
    pub fn from_class(class: u64) -> Layout {
        match class {
            0 => Layout::Compact,
            1 => Layout::Contiguous,
            2 => Layout::Chunked,
            _ => Layout::Unknown,
        }
    }
}

/// Everything the dataset assembler needs, produced by one walk of the
/// object-header graph and immutable once published.
#[derive(Debug, Clone)]
pub struct DatasetMeta {
    /// Size of file offsets in bytes (4 or 8), from the superblock.
    pub offset_size: u64,
    /// Size of lengths in bytes (4 or 8), from the superblock.
    pub length_size: u64,
    /// Datatype class of the dataset elements.
    pub data_type: DataType,
    /// Bytes per element.
    pub type_size: u64,
    /// Fill value, stored in the low `fill_size` bytes.
    pub fill_value: u64,
    /// Fill value size in bytes; 0 means no fill.
    pub fill_size: u64,
    /// Storage layout.
    pub layout: Layout,
    /// Compact: in-file offset of the inline data. Contiguous: data address.
    /// Chunked: root of the chunk B-tree.
    pub address: u64,
    /// Bytes allocated on disk (compact/contiguous only).
    pub size: u64,
    /// Number of dimensions.
    pub ndims: usize,
    /// Dimension sizes; entries past `ndims` are zero.
    pub dimensions: [u64; MAX_NDIMS],
    /// Elements per chunk (chunked only).
    pub chunk_elements: u64,
    /// Element size recorded in the layout message (chunked only).
    pub element_size: u64,
    /// DEFLATE filter present.
    pub deflate: bool,
    /// SHUFFLE filter present.
    pub shuffle: bool,
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self {
            offset_size: 0,
            length_size: 0,
            data_type: DataType::Unknown,
            type_size: 0,
            fill_value: 0,
            fill_size: 0,
            layout: Layout::Unknown,
            address: 0,
            size: 0,
            ndims: 0,
            dimensions: [0; MAX_NDIMS],
            chunk_elements: 0,
            element_size: 0,
            deflate: false,
            shuffle: false,
        }
    }
}

impl DatasetMeta {
    /// Bytes in one row: `type_size` times the product of the trailing
    /// dimensions.
    pub fn row_size(&self) -> u64 {
        let mut size = self.type_size;
        for d in 1..self.ndims {
            size *= self.dimensions[d];
        }
        size
    }

    /// Size of the first dimension, or 0 for a scalar.
    pub fn first_dimension(&self) -> u64 {
        if self.ndims > 0 {
            self.dimensions[0]
        } else {
            0
        }
    }
}

/// True when `val` is the undefined-address marker (all ones) for the given
/// offset width.
pub fn is_undefined(val: u64, offset_size: u64) -> bool {
    match offset_size {
        2 => val == 0xFFFF,
        4 => val == 0xFFFF_FFFF,
        8 => val == u64::MAX,
        _ => false,
    }
}
