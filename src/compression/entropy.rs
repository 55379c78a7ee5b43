
//! Packs quantized integers into bytes: zig-zag mapping, variable length bytes, then zlib.

use crate::compression::{deflate, inflate_at_most, ByteVec, Bytes};
use crate::error::{Error, Result, UnitResult};


/// The longest encoding of a single integer, in bytes.
pub const MAX_VALUE_BYTES: usize = 5;


/// Map signed to unsigned integers, small magnitudes to small numbers.
#[inline]
fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}


/// Compress a sequence of integers.
pub fn encode_values(values: &[i32]) -> ByteVec {
    let mut bytes = Vec::with_capacity(values.len());

    for &value in values {
        let mut remaining = zigzag(value);

        while remaining >= 0x80 {
            bytes.push((remaining as u8 & 0x7f) | 0x80);
            remaining >>= 7;
        }

        bytes.push(remaining as u8);
    }

    deflate(&bytes)
}


/// Reads the integers written by `encode_values`, one at a time.
#[derive(Debug)]
pub struct ValueReader {
    bytes: ByteVec,
    position: usize,
}

impl ValueReader {

    /// Decompress the integers, failing if more than `max_value_count` integers could be contained.
    pub fn new(compressed: Bytes<'_>, max_value_count: usize) -> Result<Self> {
        let bytes = inflate_at_most(compressed, max_value_count.saturating_mul(MAX_VALUE_BYTES))?;
        Ok(ValueReader { bytes, position: 0 })
    }

    /// The next integer. Fails at the end of the sequence.
    pub fn next_value(&mut self) -> Result<i32> {
        let mut value = 0_u32;
        let mut shift = 0_u32;

        loop {
            let byte = *self.bytes.get(self.position)
                .ok_or_else(|| Error::invalid("missing entropy coded values"))?;

            self.position += 1;

            let bits = (byte & 0x7f) as u32;
            if shift == 28 && bits > 0x0f {
                return Err(Error::invalid("entropy coded value too large"));
            }

            value |= bits << shift;
            if byte & 0x80 == 0 { return Ok(unzigzag(value)); }

            shift += 7;
            if shift > 28 {
                return Err(Error::invalid("entropy coded value too large"));
            }
        }
    }

    /// Fails unless every integer has been read.
    pub fn finish(self) -> UnitResult {
        if self.position == self.bytes.len() { Ok(()) }
        else { Err(Error::invalid("unused entropy coded values")) }
    }
}
