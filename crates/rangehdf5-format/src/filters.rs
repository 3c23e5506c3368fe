//! Chunk filters: DEFLATE inflate and the SHUFFLE byte de-interleave.

use std::io::Read;

use crate::error::FormatError;

/// Inflate a zlib stream into `output`, which must be exactly the
/// decompressed size.
pub fn inflate_chunk(input: &[u8], output: &mut [u8]) -> Result<(), FormatError> {
    let mut decoder = flate2::read::ZlibDecoder::new(input);
    let mut total = 0;
    while total < output.len() {
        match decoder.read(&mut output[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => return Err(FormatError::DecodeFailed(format!("inflate: {e}"))),
        }
    }
    if total != output.len() {
        return Err(FormatError::DecodeFailed(format!(
            "inflated {total} bytes, expected {}",
            output.len()
        )));
    }
    Ok(())
}

/// De-shuffle a window of elements out of a shuffled chunk.
///
/// The shuffled chunk stores byte plane `v` of every element contiguously;
/// plane length is `input.len() / type_size`. The window starts at element
/// `output_offset / type_size` and covers `output.len() / type_size`
/// elements, written to `output` in natural byte order.
pub fn shuffle_chunk(
    input: &[u8],
    output: &mut [u8],
    output_offset: u64,
    type_size: u64,
) -> Result<(), FormatError> {
    if type_size == 0 || type_size > 8 {
        return Err(FormatError::UnsupportedFeature(
            "shuffle element size outside 1..=8",
        ));
    }

    let type_size = type_size as usize;
    let block_size = input.len() / type_size;
    let num_elements = output.len() / type_size;
    let start_element = output_offset as usize / type_size;

    if (start_element + num_elements) > block_size {
        return Err(FormatError::OutOfRange {
            what: "shuffle element window",
            value: (start_element + num_elements) as u64,
            limit: block_size as u64,
        });
    }

    let mut dst = 0;
    for element in start_element..start_element + num_elements {
        for plane in 0..type_size {
            output[dst] = input[plane * block_size + element];
            dst += 1;
        }
    }
    Ok(())
}
