
//! A single description of a header layout, interpreted by three visitors.
//! One visitor counts the bits, one writes them, one reads them,
//! so reading always consumes exactly what writing produced.

use half::f16;

use crate::error::{u64_to_usize, Error, Result, UnitResult};
use crate::io::{BitReader, BitWriter};


/// One of the four ways a `U32Coder` may store a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum U32Distribution {

    /// Exactly this value, stored without any further bits.
    Value(u32),

    /// Any value that fits into this many bits.
    Bits(usize),

    /// This many bits, added to the offset.
    BitsOffset(usize, u32),
}

/// Stores a `u32` with a two bit selector, followed by the bits of the selected distribution.
/// The first distribution that can represent a value is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct U32Coder(pub [U32Distribution; 4]);

impl U32Distribution {

    /// The payload and its bit count, if this distribution can represent the value.
    fn encode(self, value: u32) -> Option<(u64, usize)> {
        let fits = |payload: u32, bit_count: usize| bit_count >= 32 || payload >> bit_count == 0;

        match self {
            U32Distribution::Value(expected) => if value == expected { Some((0, 0)) } else { None },
            U32Distribution::Bits(bit_count) => if fits(value, bit_count) { Some((value as u64, bit_count)) } else { None },
            U32Distribution::BitsOffset(bit_count, offset) => value.checked_sub(offset)
                .filter(|&payload| fits(payload, bit_count))
                .map(|payload| (payload as u64, bit_count)),
        }
    }

    fn decode(self, reader: &mut BitReader<'_>) -> Result<u32> {
        match self {
            U32Distribution::Value(value) => Ok(value),
            U32Distribution::Bits(bit_count) => Ok(reader.read_bits(bit_count)? as u32),
            U32Distribution::BitsOffset(bit_count, offset) => (reader.read_bits(bit_count)? as u32)
                .checked_add(offset).ok_or_else(|| Error::invalid("header value too large")),
        }
    }
}

impl U32Coder {

    /// Selector, payload, and payload bit count.
    fn encode(&self, value: u32) -> Result<(u64, u64, usize)> {
        self.0.iter().enumerate()
            .find_map(|(selector, distribution)| {
                distribution.encode(value).map(|(payload, bit_count)| (selector as u64, payload, bit_count))
            })
            .ok_or_else(|| Error::invalid("header value cannot be represented"))
    }
}

const SELECTOR_BITS: usize = 2;

/// Selector, payload, and payload bit count of a `u64`.
fn encode_u64(value: u64) -> (u64, u64, usize) {
    match value {
        0 => (0, 0, 0),
        1 ..= 16 => (1, value - 1, 4),
        17 ..= 272 => (2, value - 17, 8),
        _ => (3, value, 64),
    }
}

fn decode_u64(reader: &mut BitReader<'_>) -> Result<u64> {
    Ok(match reader.read_bits(SELECTOR_BITS)? {
        0 => 0,
        1 => reader.read_bits(4)? + 1,
        2 => reader.read_bits(8)? + 17,
        _ => reader.read_bits(64)?,
    })
}

fn u64_bit_count(value: u64) -> usize {
    SELECTOR_BITS + encode_u64(value).2
}

fn validate_bits(bit_count: usize, value: u32) -> UnitResult {
    debug_assert!(bit_count <= 32, "too many bits for u32");

    if bit_count < 32 && value >> bit_count != 0 {
        Err(Error::invalid("header value too large"))
    }
    else { Ok(()) }
}


/// Receives every field of a header.
/// Counting and writing visitors only inspect the values,
/// the reading visitor replaces them.
pub trait Visitor {

    /// A value stored with a fixed number of bits, at most 32.
    fn bits(&mut self, bit_count: usize, value: &mut u32) -> UnitResult;

    /// A value stored with a variable number of bits.
    fn u32(&mut self, coder: &U32Coder, value: &mut u32) -> UnitResult;

    /// A value stored with a variable number of bits.
    fn u64(&mut self, value: &mut u64) -> UnitResult;

    /// A single bit.
    fn bool(&mut self, value: &mut bool) -> UnitResult {
        let mut bit = *value as u32;
        self.bits(1, &mut bit)?;
        *value = bit == 1;
        Ok(())
    }

    /// A float stored with 16 bit precision.
    fn f16(&mut self, value: &mut f32) -> UnitResult {
        let mut bits = f16::from_f32(*value).to_bits() as u32;
        self.bits(16, &mut bits)?;

        let decoded = f16::from_bits(bits as u16).to_f32();
        if !decoded.is_finite() { return Err(Error::invalid("header float not finite")); }

        *value = decoded;
        Ok(())
    }

    /// Starts the optional fields. `extensions` has one bit per known extension.
    /// Extensions that the reader does not know are skipped at `end_extensions`.
    fn begin_extensions(&mut self, extensions: &mut u64) -> UnitResult;

    /// Ends the optional fields.
    fn end_extensions(&mut self) -> UnitResult;
}

/// A header that describes its layout to a visitor.
pub trait Fields {

    /// Pass each field to the visitor, in bitstream order.
    fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult;
}


/// Counts the bits a header will occupy.
#[derive(Debug, Default)]
pub struct CountVisitor {
    total_bits: usize,
    extension_start: Option<usize>,
    extension_bits: usize,
}

impl Visitor for CountVisitor {
    fn bits(&mut self, bit_count: usize, value: &mut u32) -> UnitResult {
        validate_bits(bit_count, *value)?;
        self.total_bits += bit_count;
        Ok(())
    }

    fn u32(&mut self, coder: &U32Coder, value: &mut u32) -> UnitResult {
        let (_, _, bit_count) = coder.encode(*value)?;
        self.total_bits += SELECTOR_BITS + bit_count;
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> UnitResult {
        self.total_bits += u64_bit_count(*value);
        Ok(())
    }

    fn begin_extensions(&mut self, extensions: &mut u64) -> UnitResult {
        self.u64(extensions)?;
        if *extensions != 0 { self.extension_start = Some(self.total_bits); }
        Ok(())
    }

    fn end_extensions(&mut self) -> UnitResult {
        if let Some(start) = self.extension_start.take() {
            self.extension_bits = self.total_bits - start;

            // the size of the extensions precedes them
            self.total_bits += u64_bit_count(self.extension_bits as u64);
        }

        Ok(())
    }
}


/// Writes the fields of a header.
#[derive(Debug)]
pub struct WriteVisitor<'w> {
    writer: &'w mut BitWriter,
    extension_bits: usize,
    extension_start: Option<usize>,
}

impl<'w> WriteVisitor<'w> {

    /// `extension_bits` must be the value computed by `count_bits` for the same header.
    pub fn new(writer: &'w mut BitWriter, extension_bits: usize) -> Self {
        WriteVisitor { writer, extension_bits, extension_start: None }
    }

    fn write_u64(&mut self, value: u64) {
        let (selector, payload, bit_count) = encode_u64(value);
        self.writer.write_bits(selector, SELECTOR_BITS);
        self.writer.write_bits(payload, bit_count);
    }
}

impl Visitor for WriteVisitor<'_> {
    fn bits(&mut self, bit_count: usize, value: &mut u32) -> UnitResult {
        validate_bits(bit_count, *value)?;
        self.writer.write_bits(*value as u64, bit_count);
        Ok(())
    }

    fn u32(&mut self, coder: &U32Coder, value: &mut u32) -> UnitResult {
        let (selector, payload, bit_count) = coder.encode(*value)?;
        self.writer.write_bits(selector, SELECTOR_BITS);
        self.writer.write_bits(payload, bit_count);
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> UnitResult {
        self.write_u64(*value);
        Ok(())
    }

    fn begin_extensions(&mut self, extensions: &mut u64) -> UnitResult {
        self.write_u64(*extensions);

        if *extensions != 0 {
            self.write_u64(self.extension_bits as u64);
            self.extension_start = Some(self.writer.bit_position());
        }

        Ok(())
    }

    fn end_extensions(&mut self) -> UnitResult {
        if let Some(start) = self.extension_start.take() {
            if self.writer.bit_position() - start != self.extension_bits {
                return Err(Error::invalid("header extension size mismatch"));
            }
        }

        Ok(())
    }
}


/// Reads the fields of a header.
#[derive(Debug)]
pub struct ReadVisitor<'r, 'b> {
    reader: &'r mut BitReader<'b>,
    extension_end: Option<usize>,
}

impl<'r, 'b> ReadVisitor<'r, 'b> {

    /// Read from the current position of the reader.
    pub fn new(reader: &'r mut BitReader<'b>) -> Self {
        ReadVisitor { reader, extension_end: None }
    }
}

impl Visitor for ReadVisitor<'_, '_> {
    fn bits(&mut self, bit_count: usize, value: &mut u32) -> UnitResult {
        *value = self.reader.read_bits(bit_count)? as u32;
        Ok(())
    }

    fn u32(&mut self, coder: &U32Coder, value: &mut u32) -> UnitResult {
        let selector = self.reader.read_bits(SELECTOR_BITS)? as usize;
        *value = coder.0[selector].decode(self.reader)?;
        Ok(())
    }

    fn u64(&mut self, value: &mut u64) -> UnitResult {
        *value = decode_u64(self.reader)?;
        Ok(())
    }

    fn begin_extensions(&mut self, extensions: &mut u64) -> UnitResult {
        *extensions = decode_u64(self.reader)?;

        if *extensions != 0 {
            let bit_count = u64_to_usize(decode_u64(self.reader)?, "header extension too large")?;
            let end = self.reader.bit_position().checked_add(bit_count)
                .ok_or_else(|| Error::invalid("header extension too large"))?;

            self.extension_end = Some(end);
        }

        Ok(())
    }

    fn end_extensions(&mut self) -> UnitResult {
        if let Some(end) = self.extension_end.take() {
            let position = self.reader.bit_position();
            if position > end { return Err(Error::invalid("header extension larger than declared")); }

            // skip extensions unknown to this decoder
            self.reader.skip_bits(end - position)?;
        }

        Ok(())
    }
}


/// The number of bits of the extensions, and of the whole header.
pub fn count_bits(fields: &mut impl Fields) -> Result<(usize, usize)> {
    let mut visitor = CountVisitor::default();
    fields.visit_fields(&mut visitor)?;
    Ok((visitor.extension_bits, visitor.total_bits))
}

/// Write all fields. `extension_bits` must be the value computed by `count_bits`.
pub fn write_fields(fields: &mut impl Fields, extension_bits: usize, writer: &mut BitWriter) -> UnitResult {
    fields.visit_fields(&mut WriteVisitor::new(writer, extension_bits))
}

/// Read all fields into a default value.
pub fn read_fields<F: Fields + Default>(reader: &mut BitReader<'_>) -> Result<F> {
    let mut fields = F::default();
    fields.visit_fields(&mut ReadVisitor::new(reader))?;
    Ok(fields)
}


#[cfg(test)]
mod test {
    use super::*;

    const CODER: U32Coder = U32Coder([
        U32Distribution::Value(0), U32Distribution::Bits(4),
        U32Distribution::BitsOffset(8, 16), U32Distribution::Bits(32),
    ]);

    #[derive(Debug, Default, PartialEq, Clone)]
    struct Sample {
        small: u32,
        large: u32,
        wide: u64,
        flag: bool,
        float: f32,
        extension: Option<u32>,
    }

    impl Fields for Sample {
        fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
            visitor.u32(&CODER, &mut self.small)?;
            visitor.u32(&CODER, &mut self.large)?;
            visitor.u64(&mut self.wide)?;
            visitor.bool(&mut self.flag)?;
            visitor.f16(&mut self.float)?;

            let mut extensions = self.extension.is_some() as u64;
            visitor.begin_extensions(&mut extensions)?;

            if extensions & 1 != 0 {
                let mut value = self.extension.unwrap_or_default();
                visitor.bits(11, &mut value)?;
                self.extension = Some(value);
            }
            else { self.extension = None; }

            visitor.end_extensions()
        }
    }

    fn round_trip(mut sample: Sample) -> Sample {
        let (extension_bits, total_bits) = count_bits(&mut sample).unwrap();

        let mut writer = BitWriter::new();
        write_fields(&mut sample, extension_bits, &mut writer).unwrap();
        assert_eq!(writer.bit_position(), total_bits);

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let decoded = read_fields(&mut reader).unwrap();
        assert_eq!(reader.bit_position(), total_bits);
        decoded
    }

    #[test]
    fn fields_are_read_as_written(){
        let samples = [
            Sample::default(),
            Sample { small: 3, large: 200, wide: 5, flag: true, float: 1.5, extension: None },
            Sample { small: 15, large: u32::MAX, wide: 272, flag: false, float: -0.25, extension: Some(2047) },
            Sample { small: 16, large: 271, wide: u64::MAX, flag: true, float: 1000.0, extension: Some(0) },
        ];

        for sample in samples.iter() {
            assert_eq!(&round_trip(sample.clone()), sample);
        }
    }

    #[test]
    fn unrepresentable_values_are_rejected(){
        let coder = U32Coder([
            U32Distribution::Value(1), U32Distribution::Value(2),
            U32Distribution::Bits(2), U32Distribution::BitsOffset(3, 100),
        ]);

        assert!(coder.encode(50).is_err());
        assert!(coder.encode(108).is_err());
        assert_eq!(coder.encode(107).unwrap(), (3, 7, 3));
        assert_eq!(coder.encode(2).unwrap(), (1, 0, 0));

        let mut sample = Sample { extension: Some(4096), .. Sample::default() };
        assert!(count_bits(&mut sample).is_err());
    }
}
