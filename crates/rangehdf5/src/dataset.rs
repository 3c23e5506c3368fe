//! Dataset assembly: output-buffer allocation, layout dispatch, column
//! selection, and numeric coercion.

use rangehdf5_format::{ChunkWalker, DataType, DatasetMeta, Layout};
use rangehdf5_io::RangeReader;

use crate::error::Error;

/// Pass as `num_rows` to read every row of the dataset.
pub const ALL_ROWS: i64 = -1;

/// The element representation a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Whatever the dataset natively holds.
    Dynamic,
    /// Coerce to `i32`.
    Integer,
    /// Coerce to `f64`.
    Real,
    /// Text data, returned as raw bytes.
    Text,
}

/// Numeric kind of the returned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Dynamic,
    Integer,
    Real,
    Text,
}

/// The result of one dataset read.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Raw little-endian element bytes.
    pub data: Vec<u8>,
    /// Number of elements in `data`.
    pub elements: u64,
    /// Length of `data` in bytes.
    pub datasize: u64,
    /// Numeric kind of the elements.
    pub datatype: NumericKind,
    /// Bytes per element.
    pub typesize: u64,
    /// Rows returned.
    pub numrows: u64,
    /// Columns per row (1 for one-dimensional data).
    pub numcols: u64,
}

/// Resolve `ALL_ROWS` and validate the requested range against the first
/// dimension.
pub(crate) fn resolve_rows(
    meta: &DatasetMeta,
    start_row: u64,
    num_rows: i64,
) -> Result<u64, Error> {
    let first_dimension = meta.first_dimension();
    let num_rows = if num_rows == ALL_ROWS {
        first_dimension
    } else {
        num_rows.max(0) as u64
    };
    if start_row + num_rows > first_dimension {
        return Err(Error::RowsOutOfRange {
            start_row,
            num_rows,
            rows: first_dimension,
        });
    }
    Ok(num_rows)
}

/// Read `[start_row, start_row + num_rows)` of the dataset into a fresh
/// buffer, dispatching on the storage layout.
pub(crate) fn read_dataset(
    reader: &RangeReader,
    meta: &DatasetMeta,
    start_row: u64,
    num_rows: u64,
) -> Result<DatasetInfo, Error> {
    if meta.type_size == 0 {
        return Err(Error::MissingDatatype);
    }

    let row_size = meta.row_size();
    let buffer_size = row_size * num_rows;
    let mut buffer = vec![0u8; buffer_size as usize];

    // Tile the fill value across the buffer before any chunk lands, so
    // unallocated regions keep the declared fill pattern.
    if meta.fill_size > 0 {
        let fill = meta.fill_value.to_le_bytes();
        let fill = &fill[..meta.fill_size as usize];
        for slot in buffer.chunks_mut(meta.fill_size as usize) {
            slot.copy_from_slice(&fill[..slot.len()]);
        }
    }

    let info_datatype = match meta.data_type {
        DataType::FixedPoint => NumericKind::Integer,
        DataType::FloatingPoint => NumericKind::Real,
        DataType::String => NumericKind::Text,
        _ => NumericKind::Dynamic,
    };
    let numcols = match meta.ndims {
        0 => 0,
        1 => 1,
        _ => meta.dimensions[1],
    };

    let buffer_offset = row_size * start_row;

    if buffer_size > 0 {
        match meta.layout {
            Layout::Compact | Layout::Contiguous => {
                if meta.deflate || meta.shuffle {
                    return Err(Error::FiltersOnUnchunkedLayout);
                }
                if rangehdf5_format::meta::is_undefined(meta.address, meta.offset_size) {
                    return Err(Error::Format(
                        rangehdf5_format::FormatError::UnsupportedFeature(
                            "data not allocated in contiguous layout",
                        ),
                    ));
                }
                if meta.size != 0 && meta.size < buffer_offset + buffer_size {
                    return Err(Error::ReadExceedsAllocation {
                        needed: buffer_offset + buffer_size,
                        allocated: meta.size,
                    });
                }
                let mut data_addr = meta.address + buffer_offset;
                let data = reader.request(buffer_size, &mut data_addr, 0).map_err(Error::Io)?;
                buffer.copy_from_slice(&data);
            }
            Layout::Chunked => {
                if meta.shuffle && !meta.deflate {
                    return Err(Error::Format(
                        rangehdf5_format::FormatError::UnsupportedFeature(
                            "shuffle filter on uncompressed chunk",
                        ),
                    ));
                }
                let mut walker =
                    ChunkWalker::new(reader, meta, start_row, num_rows).map_err(Error::Format)?;
                walker
                    .read_into(&mut buffer, buffer_offset)
                    .map_err(Error::Format)?;
            }
            Layout::Unknown => {
                return Err(Error::Format(
                    rangehdf5_format::FormatError::UnsupportedFeature("data layout class"),
                ));
            }
        }
    }

    Ok(DatasetInfo {
        elements: buffer_size / meta.type_size,
        datasize: buffer_size,
        data: buffer,
        datatype: info_datatype,
        typesize: meta.type_size,
        numrows: num_rows,
        numcols,
    })
}

/// Replace the buffer with a single column's elements.
pub(crate) fn select_column(info: &mut DatasetInfo, column: u64) -> Result<(), Error> {
    if column >= info.numcols {
        return Err(Error::ColumnOutOfRange {
            column,
            cols: info.numcols,
        });
    }
    if info.numrows == 0 {
        return Ok(());
    }

    let row_size = (info.datasize / info.numrows) as usize;
    let col_size = row_size / info.numcols as usize;
    let mut out = Vec::with_capacity(info.datasize as usize / info.numcols as usize);
    for row in 0..info.numrows as usize {
        let offset = row * row_size + column as usize * col_size;
        out.extend_from_slice(&info.data[offset..offset + col_size]);
    }

    info.datasize = out.len() as u64;
    info.elements /= info.numcols;
    info.data = out;
    Ok(())
}

/// Coerce the buffer element-wise to the requested value type. `Dynamic` and
/// `Text` requests leave the native bytes untouched.
pub(crate) fn translate(info: &mut DatasetInfo, val_type: ValueType) -> Result<(), Error> {
    match val_type {
        ValueType::Dynamic | ValueType::Text => Ok(()),
        ValueType::Integer => {
            let out = each_element_to_i32(info)?;
            let mut data = Vec::with_capacity(out.len() * 4);
            for v in out {
                data.extend_from_slice(&v.to_le_bytes());
            }
            info.datasize = data.len() as u64;
            info.data = data;
            info.datatype = NumericKind::Integer;
            info.typesize = 4;
            Ok(())
        }
        ValueType::Real => {
            let out = each_element_to_f64(info)?;
            let mut data = Vec::with_capacity(out.len() * 8);
            for v in out {
                data.extend_from_slice(&v.to_le_bytes());
            }
            info.datasize = data.len() as u64;
            info.data = data;
            info.datatype = NumericKind::Real;
            info.typesize = 8;
            Ok(())
        }
    }
}

fn translation_failed(info: &DatasetInfo) -> Error {
    Error::TranslationFailed {
        from: info.datatype,
        type_size: info.typesize,
    }
}

fn each_element_to_i32(info: &DatasetInfo) -> Result<Vec<i32>, Error> {
    let n = info.elements as usize;
    let raw = &info.data;
    let mut out = Vec::with_capacity(n);
    match (info.datatype, info.typesize) {
        (NumericKind::Real, 4) => {
            for i in 0..n {
                let v = f32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
                out.push(v as i32);
            }
        }
        (NumericKind::Real, 8) => {
            for i in 0..n {
                let v = f64::from_le_bytes(raw[i * 8..i * 8 + 8].try_into().unwrap());
                out.push(v as i32);
            }
        }
        (NumericKind::Integer, 1) => {
            for &b in raw.iter().take(n) {
                out.push(b as i32);
            }
        }
        (NumericKind::Integer, 2) => {
            for i in 0..n {
                let v = u16::from_le_bytes(raw[i * 2..i * 2 + 2].try_into().unwrap());
                out.push(v as i32);
            }
        }
        (NumericKind::Integer, 4) => {
            for i in 0..n {
                let v = u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
                out.push(v as i32);
            }
        }
        (NumericKind::Integer, 8) => {
            for i in 0..n {
                let v = u64::from_le_bytes(raw[i * 8..i * 8 + 8].try_into().unwrap());
                out.push(v as i32);
            }
        }
        _ => return Err(translation_failed(info)),
    }
    Ok(out)
}

fn each_element_to_f64(info: &DatasetInfo) -> Result<Vec<f64>, Error> {
    let n = info.elements as usize;
    let raw = &info.data;
    let mut out = Vec::with_capacity(n);
    match (info.datatype, info.typesize) {
        (NumericKind::Real, 4) => {
            for i in 0..n {
                let v = f32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
                out.push(v as f64);
            }
        }
        (NumericKind::Real, 8) => {
            for i in 0..n {
                let v = f64::from_le_bytes(raw[i * 8..i * 8 + 8].try_into().unwrap());
                out.push(v);
            }
        }
        (NumericKind::Integer, 1) => {
            for &b in raw.iter().take(n) {
                out.push(b as f64);
            }
        }
        (NumericKind::Integer, 2) => {
            for i in 0..n {
                let v = u16::from_le_bytes(raw[i * 2..i * 2 + 2].try_into().unwrap());
                out.push(v as f64);
            }
        }
        (NumericKind::Integer, 4) => {
            for i in 0..n {
                let v = u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
                out.push(v as f64);
            }
        }
        (NumericKind::Integer, 8) => {
            for i in 0..n {
                let v = u64::from_le_bytes(raw[i * 8..i * 8 + 8].try_into().unwrap());
                out.push(v as f64);
            }
        }
        _ => return Err(translation_failed(info)),
    }
    Ok(out)
}
