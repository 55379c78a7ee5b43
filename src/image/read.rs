
//! Decode a pik file into an image.

use crate::block::parallel::WorkerPool;
use crate::block::BLOCK_DIM;
use crate::compression::{inflate, Bytes, MAX_INFLATE_RATIO};
use crate::error::{u64_to_usize, Error, Result};
use crate::image::params::DecompressParams;
use crate::image::CodecInOut;
use crate::io::BitReader;
use crate::math::RoundingMode;
use crate::meta::{brunsli, read_file_header, FileHeader};
use crate::pass::decode::MultipassDecoder;
use crate::pass::PikInfo;
use smallvec::SmallVec;


/// Decompress a pik file into a linear image.
/// If `info` is specified, it receives the byte count of each part of the file.
#[tracing::instrument(level = "debug", skip_all)]
pub fn pik_to_pixels(
    params: &DecompressParams, bytes: Bytes<'_>, pool: &WorkerPool, info: Option<&mut PikInfo>
) -> Result<CodecInOut>
{
    if brunsli::is_brunsli(bytes) {
        return Err(Error::unsupported("brunsli decoding is not implemented yet"));
    }

    let mut reader = BitReader::new(bytes);
    let header = read_header(params, &mut reader)?;
    let header_bytes = reader.byte_position();

    let preview_bytes = match header.preview {
        Some(preview) => u64_to_usize(preview.size_bits / 8, "preview too large")?,
        None => 0,
    };

    reader.read_bytes(preview_bytes)?;

    // every pass decompresses to at least one byte per block
    let blocks = header.size.divide(BLOCK_DIM, RoundingMode::Up).area();
    let remaining_bytes = bytes.len().saturating_sub(reader.byte_position());
    if blocks > remaining_bytes.saturating_mul(MAX_INFLATE_RATIO) {
        return Err(Error::invalid("image size exceeds what the file can contain"));
    }

    let mut decoder = MultipassDecoder::new(header.size, pool)?;
    let mut passes: SmallVec<[_; 4]> = SmallVec::new();

    while !decoder.is_finished() {
        if params.max_passes.map_or(false, |max| passes.len() >= max) { break; }
        passes.push(decoder.decode_pass(&mut reader)?);
    }

    if decoder.is_finished() && params.check_decompressed_size && reader.byte_position() != bytes.len() {
        return Err(Error::invalid("pik compressed data size mismatch"));
    }

    tracing::debug!(passes = passes.len(), bytes = reader.byte_position(), "decoded image");

    if let Some(info) = info {
        *info = PikInfo { header_bytes, preview_bytes, passes };
    }

    let mut io = CodecInOut::new(decoder.into_image(), Some(header.original_bits_per_sample));
    io.encoded_size = reader.byte_position();
    Ok(io)
}

/// Decompress only the preview of a pik file, if it has one.
/// The preview contains 8 bit sRGB samples converted to linear samples.
pub fn read_preview(params: &DecompressParams, bytes: Bytes<'_>) -> Result<Option<CodecInOut>> {
    if brunsli::is_brunsli(bytes) {
        return Err(Error::unsupported("brunsli decoding is not implemented yet"));
    }

    let mut reader = BitReader::new(bytes);
    let header = read_header(params, &mut reader)?;

    let preview = match header.preview {
        Some(preview) => preview,
        None => return Ok(None),
    };

    if preview.size.has_zero_area() {
        return Err(Error::invalid("empty preview"));
    }

    let sample_count = preview.size.width().checked_mul(preview.size.height())
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| Error::invalid("preview too large"))?;

    let compressed = reader.read_bytes(u64_to_usize(preview.size_bits / 8, "preview too large")?)?;
    let samples = inflate(compressed, sample_count)?;

    let mut io = CodecInOut::from_srgb8(preview.size, &samples)?;
    io.encoded_size = compressed.len();
    Ok(Some(io))
}

/// Read the file header and the padding after it, checking the image size limit.
fn read_header(params: &DecompressParams, reader: &mut BitReader<'_>) -> Result<FileHeader> {
    let header = read_file_header(reader)?;
    reader.jump_to_byte_boundary();

    tracing::trace!(size = ?header.size, bits = reader.bit_position(), "read file header");

    let pixels = header.size.width().checked_mul(header.size.height())
        .ok_or_else(|| Error::invalid("image too large"))?;

    if params.max_pixels.map_or(false, |max| pixels > max) {
        return Err(Error::invalid("image too large"));
    }

    Ok(header)
}
