
//! Describes the meta data of a pik file: the file header, which precedes everything,
//! and the pass headers, which precede the payload of each pass.

pub mod fields;
pub mod pass;

use bit_field::BitField;

use crate::error::{usize_to_u32, Error, Result, UnitResult};
use crate::io::{BitReader, BitWriter};
use crate::math::Vec2;
use self::fields::{Fields, U32Coder, U32Distribution, Visitor};


/// The global parameters of an image, stored at the start of each file.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FileHeader {

    /// Width and height of the image in pixels.
    pub size: Vec2<usize>,

    /// The bit depth of the samples the image was created from, `1 ..= 32`.
    pub original_bits_per_sample: u32,

    /// A small version of the image, stored between header and passes.
    /// Decoders can skip it without looking at its contents.
    pub preview: Option<Preview>,

    /// The encoder that produced the file, if known.
    pub encoder_version: Option<EncoderVersion>,
}

/// Describes the optional preview image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Preview {

    /// The number of bits of the preview payload, a multiple of eight.
    pub size_bits: u64,

    /// Width and height of the preview in pixels.
    pub size: Vec2<usize>,
}

/// Identifies the encoder that produced a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EncoderVersion {

    /// Incremented on incompatible changes.
    pub major: u8,

    /// Incremented on compatible changes.
    pub minor: u8,
}

impl EncoderVersion {

    /// The version of this encoder.
    pub const CURRENT: EncoderVersion = EncoderVersion { major: 0, minor: 1 };
}


/// The first four bytes of each pik file.
pub mod signature {

    /// The first four bytes of each pik file.
    pub const BYTES: [u8; 4] = *b"PiK\n";

    /// The signature as read from the bitstream.
    pub fn value() -> u32 { u32::from_le_bytes(BYTES) }
}

/// Files of an alternative format that starts with a different signature.
pub mod brunsli {

    /// The first bytes of each brunsli file.
    pub const MAGIC: [u8; 7] = [ 0x0A, 0x04, 0x42, 0xD2, 0xD5, 0x4E, 0x12 ];

    /// Whether the bytes start like a brunsli file.
    /// Returns false for buffers shorter than the magic bytes.
    pub fn is_brunsli(bytes: &[u8]) -> bool {
        bytes.starts_with(&MAGIC)
    }
}

mod flags {
    pub const HAS_PREVIEW: usize = 0;
    pub const KNOWN: u32 = 0b1;
    pub const BITS: usize = 8;
}

mod extensions {
    pub const ENCODER_VERSION: usize = 0;
}

/// Image dimensions from one to 2^30.
const DIMENSION_CODER: U32Coder = U32Coder([
    U32Distribution::BitsOffset(9, 1), U32Distribution::BitsOffset(13, 1),
    U32Distribution::BitsOffset(18, 1), U32Distribution::BitsOffset(30, 1),
]);

const BITS_PER_SAMPLE_BITS: usize = 5;


fn visit_dimensions(visitor: &mut impl Visitor, size: &mut Vec2<usize>) -> UnitResult {
    let mut width = usize_to_u32(size.width(), "image too large")?;
    let mut height = usize_to_u32(size.height(), "image too large")?;

    visitor.u32(&DIMENSION_CODER, &mut width)?;
    visitor.u32(&DIMENSION_CODER, &mut height)?;

    *size = Vec2(width as usize, height as usize);
    Ok(())
}

impl Fields for Preview {
    fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
        visitor.u64(&mut self.size_bits)?;
        visit_dimensions(visitor, &mut self.size)?;

        if self.size_bits % 8 != 0 {
            return Err(Error::invalid("preview size not a multiple of bytes"));
        }

        Ok(())
    }
}

impl Fields for EncoderVersion {
    fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
        let mut major = self.major as u32;
        let mut minor = self.minor as u32;

        visitor.bits(8, &mut major)?;
        visitor.bits(8, &mut minor)?;

        self.major = major as u8;
        self.minor = minor as u8;
        Ok(())
    }
}

impl FileHeader {

    /// Create a header for a new image.
    pub fn new(size: Vec2<usize>, original_bits_per_sample: u32) -> Self {
        FileHeader {
            size, original_bits_per_sample,
            preview: None,
            encoder_version: Some(EncoderVersion::CURRENT),
        }
    }

    /// The fields that every decoder understands.
    fn visit_required_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
        let mut signature = signature::value();
        visitor.bits(32, &mut signature)?;

        if signature != signature::value() {
            return Err(Error::invalid("pik signature missing"));
        }

        visit_dimensions(visitor, &mut self.size)?;

        // stored minus one, zero wraps around and fails
        let mut bits_per_sample = self.original_bits_per_sample.wrapping_sub(1);
        visitor.bits(BITS_PER_SAMPLE_BITS, &mut bits_per_sample)?;
        self.original_bits_per_sample = bits_per_sample + 1;

        let mut flags = 0_u32;
        flags.set_bit(flags::HAS_PREVIEW, self.preview.is_some());
        visitor.bits(flags::BITS, &mut flags)?;

        if flags & !flags::KNOWN != 0 {
            return Err(Error::unsupported("unknown file header flags"));
        }

        self.preview = if flags.get_bit(flags::HAS_PREVIEW) {
            let mut preview = self.preview.unwrap_or_default();
            preview.visit_fields(visitor)?;
            Some(preview)
        }
        else { None };

        Ok(())
    }
}

impl Fields for FileHeader {
    fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
        self.visit_required_fields(visitor)?;

        let mut present = 0_u64;
        present.set_bit(extensions::ENCODER_VERSION, self.encoder_version.is_some());
        visitor.begin_extensions(&mut present)?;

        self.encoder_version = if present.get_bit(extensions::ENCODER_VERSION) {
            let mut version = self.encoder_version.unwrap_or_default();
            version.visit_fields(visitor)?;
            Some(version)
        }
        else { None };

        visitor.end_extensions()
    }
}


/// Compute the exact size of the header without writing anything.
/// Returns the number of bits of the extensions and of the whole header.
/// Fails if a value of the header cannot be stored.
pub fn can_encode(header: &FileHeader) -> Result<(usize, usize)> {
    fields::count_bits(&mut header.clone())
}

/// Write the header. `extension_bits` must be the value returned by `can_encode`.
pub fn write_file_header(header: &FileHeader, extension_bits: usize, writer: &mut BitWriter) -> UnitResult {
    fields::write_fields(&mut header.clone(), extension_bits, writer)
}

/// Read the header, leaving the reader at the bit after the header.
pub fn read_file_header(reader: &mut BitReader<'_>) -> Result<FileHeader> {
    let header: FileHeader = fields::read_fields(reader)?;

    if header.size.has_zero_area() {
        return Err(Error::invalid("empty image"));
    }

    Ok(header)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::fields::{count_bits, write_fields};

    fn write(header: &FileHeader) -> (Vec<u8>, usize) {
        let (extension_bits, total_bits) = can_encode(header).unwrap();
        let mut writer = BitWriter::with_capacity_bits(total_bits);
        write_file_header(header, extension_bits, &mut writer).unwrap();
        assert_eq!(writer.bit_position(), total_bits);
        (writer.into_bytes(), total_bits)
    }

    #[test]
    fn header_is_read_as_written(){
        let headers = [
            FileHeader::new(Vec2(1, 1), 8),
            FileHeader::new(Vec2(512, 513), 16),
            FileHeader { preview: Some(Preview { size_bits: 8 * 1234, size: Vec2(64, 48) }), .. FileHeader::new(Vec2(1 << 30, 3), 32) },
            FileHeader { encoder_version: None, .. FileHeader::new(Vec2(70_000, 9), 1) },
        ];

        for header in headers.iter() {
            let (bytes, total_bits) = write(header);

            let mut reader = BitReader::new(&bytes);
            assert_eq!(&read_file_header(&mut reader).unwrap(), header);
            assert_eq!(reader.bit_position(), total_bits);
        }
    }

    #[test]
    fn unrepresentable_headers_are_rejected(){
        assert!(can_encode(&FileHeader::new(Vec2(0, 3), 8)).is_err());
        assert!(can_encode(&FileHeader::new(Vec2((1 << 30) + 1, 3), 8)).is_err());
        assert!(can_encode(&FileHeader::new(Vec2(4, 3), 0)).is_err());
        assert!(can_encode(&FileHeader::new(Vec2(4, 3), 33)).is_err());
    }

    #[test]
    fn wrong_signature_is_rejected(){
        let (mut bytes, _) = write(&FileHeader::new(Vec2(5, 5), 8));
        bytes[0] ^= 1;
        assert!(matches!(read_file_header(&mut BitReader::new(&bytes)), Err(Error::Invalid(_))));
    }

    #[test]
    fn truncated_header_is_rejected(){
        let (bytes, _) = write(&FileHeader::new(Vec2(300, 200), 8));
        for length in 0 .. bytes.len() {
            assert!(read_file_header(&mut BitReader::new(&bytes[.. length])).is_err());
        }
    }

    /// A header written by a newer encoder with an additional extension.
    struct FutureHeader {
        header: FileHeader,
        future_field: u32,
    }

    impl Fields for FutureHeader {
        fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
            self.header.visit_required_fields(visitor)?;

            let mut present = 0b100001_u64;
            visitor.begin_extensions(&mut present)?;
            self.header.encoder_version.get_or_insert(EncoderVersion::CURRENT).visit_fields(visitor)?;
            visitor.bits(23, &mut self.future_field)?;
            visitor.end_extensions()
        }
    }

    #[test]
    fn unknown_extensions_are_skipped(){
        let mut future = FutureHeader { header: FileHeader::new(Vec2(20, 30), 8), future_field: 0x7a_bcde };

        let (extension_bits, total_bits) = count_bits(&mut future).unwrap();
        assert_eq!(extension_bits, 16 + 23);

        let mut writer = BitWriter::new();
        write_fields(&mut future, extension_bits, &mut writer).unwrap();
        writer.write_bits(0b1011, 4);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(read_file_header(&mut reader).unwrap(), future.header);
        assert_eq!(reader.bit_position(), total_bits);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1011);
    }

    #[test]
    fn brunsli_detection(){
        assert!(brunsli::is_brunsli(&[0x0A, 0x04, 0x42, 0xD2, 0xD5, 0x4E, 0x12, 0x00]));
        assert!(!brunsli::is_brunsli(&[0x0A, 0x04, 0x42]));
        assert!(!brunsli::is_brunsli(&signature::BYTES));
    }
}
