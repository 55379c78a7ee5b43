
//! Bit level reading and writing.
//! Bits are packed least significant bit first within each byte.

use crate::compression::ByteVec;
use crate::error::{Error, Result, UnitResult};
use crate::math::RoundingMode;


/// Appends bits to a growing byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: ByteVec,
    bit_count: usize,
}

impl BitWriter {

    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer that will not reallocate
    /// before `bit_count` bits have been written.
    pub fn with_capacity_bits(bit_count: usize) -> Self {
        BitWriter {
            bytes: Vec::with_capacity(RoundingMode::Up.divide(bit_count, 8)),
            bit_count: 0,
        }
    }

    /// The number of bits written so far.
    pub fn bit_position(&self) -> usize { self.bit_count }

    /// Whether the next bit starts a new byte.
    pub fn is_byte_aligned(&self) -> bool { self.bit_count % 8 == 0 }

    /// Write the `count` low-order bits of `value`.
    pub fn write_bits(&mut self, mut value: u64, mut count: usize) {
        debug_assert!(count <= 64, "bit count too large");
        debug_assert!(count == 64 || value >> count == 0, "value does not fit into bit count");

        while count > 0 {
            let bit_in_byte = self.bit_count % 8;
            if bit_in_byte == 0 { self.bytes.push(0); }

            let take = (8 - bit_in_byte).min(count);
            let chunk = (value & ((1_u64 << take) - 1)) as u8;

            let last = self.bytes.len() - 1;
            self.bytes[last] |= chunk << bit_in_byte;

            value >>= take;
            count -= take;
            self.bit_count += take;
        }
    }

    /// Write a single bit.
    pub fn write_bool(&mut self, bit: bool) {
        self.write_bits(bit as u64, 1);
    }

    /// Fill the current byte with zero bits.
    pub fn zero_pad_to_byte(&mut self) {
        self.bit_count = RoundingMode::Up.to_multiple(self.bit_count, 8);
        debug_assert_eq!(self.bytes.len() * 8, self.bit_count);
    }

    /// Append whole bytes. The writer must be byte aligned.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.is_byte_aligned(), "unaligned byte write");
        self.bytes.extend_from_slice(bytes);
        self.bit_count += bytes.len() * 8;
    }

    /// The bytes written so far, with the last byte zero padded.
    pub fn bytes(&self) -> &[u8] { &self.bytes }

    /// Finish writing, zero padding the last byte.
    pub fn into_bytes(self) -> ByteVec { self.bytes }
}


/// Reads bits from a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'b> {
    bytes: &'b [u8],
    bit_position: usize,
}

impl<'b> BitReader<'b> {

    /// Start reading at the first bit of the slice.
    pub fn new(bytes: &'b [u8]) -> Self {
        BitReader { bytes, bit_position: 0 }
    }

    /// The number of bits consumed so far.
    pub fn bit_position(&self) -> usize { self.bit_position }

    /// The number of bytes touched so far, counting a partially consumed byte.
    pub fn byte_position(&self) -> usize {
        RoundingMode::Up.divide(self.bit_position, 8)
    }

    /// The number of bits not yet consumed.
    pub fn remaining_bits(&self) -> usize {
        self.bytes.len() * 8 - self.bit_position
    }

    fn require(&self, bit_count: usize) -> UnitResult {
        if bit_count > self.remaining_bits() {
            Err(Error::invalid("unexpected end of bitstream"))
        }
        else { Ok(()) }
    }

    /// Read `count` bits into the low-order bits of the result.
    pub fn read_bits(&mut self, count: usize) -> Result<u64> {
        debug_assert!(count <= 64, "bit count too large");
        self.require(count)?;

        let mut value = 0_u64;
        let mut shift = 0;

        while shift < count {
            let byte = self.bytes[self.bit_position / 8];
            let bit_in_byte = self.bit_position % 8;
            let take = (8 - bit_in_byte).min(count - shift);

            let chunk = (byte >> bit_in_byte) as u64 & ((1_u64 << take) - 1);
            value |= chunk << shift;

            shift += take;
            self.bit_position += take;
        }

        Ok(value)
    }

    /// Read a single bit.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Move the cursor forward without interpreting the bits.
    pub fn skip_bits(&mut self, count: usize) -> UnitResult {
        self.require(count)?;
        self.bit_position += count;
        Ok(())
    }

    /// Skip the remaining bits of a partially consumed byte.
    pub fn jump_to_byte_boundary(&mut self) {
        self.bit_position = RoundingMode::Up.to_multiple(self.bit_position, 8);
    }

    /// Read whole bytes. The reader must be byte aligned.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'b [u8]> {
        debug_assert_eq!(self.bit_position % 8, 0, "unaligned byte read");

        let start = self.bit_position / 8;
        let bit_count = count.checked_mul(8).ok_or_else(|| Error::invalid("byte count"))?;
        self.require(bit_count)?;

        self.bit_position += bit_count;
        Ok(&self.bytes[start .. start + count])
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bits_are_packed_least_significant_first(){
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b11111, 5);
        writer.write_bool(true);
        assert_eq!(writer.bytes(), &[0b1111_1101, 0b1]);
        assert_eq!(writer.bit_position(), 9);
    }

    #[test]
    fn read_what_was_written(){
        let fields: [(u64, usize); 7] = [
            (1, 1), (0x3ff, 10), (0, 3), (0xdead_beef, 32),
            (u64::MAX, 64), (17, 5), (0x1234_5678_9abc, 48),
        ];

        let mut writer = BitWriter::with_capacity_bits(200);
        for &(value, count) in &fields { writer.write_bits(value, count); }
        writer.zero_pad_to_byte();
        writer.write_bytes(&[7, 8, 9]);

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);

        for &(value, count) in &fields {
            assert_eq!(reader.read_bits(count).unwrap(), value);
        }

        reader.jump_to_byte_boundary();
        assert_eq!(reader.read_bytes(3).unwrap(), &[7, 8, 9]);
        assert_eq!(reader.remaining_bits(), 0);
        assert_eq!(reader.byte_position(), bytes.len());
    }

    #[test]
    fn reading_past_the_end_fails(){
        let mut reader = BitReader::new(&[0xff]);
        assert!(reader.read_bits(7).is_ok());
        assert!(reader.read_bits(2).is_err());
        assert!(reader.skip_bits(2).is_err());
        assert!(reader.skip_bits(1).is_ok());
        assert!(reader.read_bool().is_err());
    }
}
