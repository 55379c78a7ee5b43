
//! Encode an image into a pik file.

use crate::block::parallel::WorkerPool;
use crate::compression::{deflate, ByteVec};
use crate::error::{Error, Result};
use crate::image::convert::srgb8_from_linear_approximate;
use crate::image::params::CompressParams;
use crate::image::{CodecInOut, Rect};
use crate::io::BitWriter;
use crate::math::{RoundingMode, Vec2};
use crate::meta::{can_encode, write_file_header, FileHeader, Preview};
use crate::pass::encode::MultipassEncoder;
use crate::pass::PikInfo;


/// Pixels per preview pixel in each direction.
pub const PREVIEW_DOWNSAMPLING: usize = 8;


/// Compress a linear image.
/// If `info` is specified, it receives the byte count of each part of the file.
/// Returns the bytes only when every pass has been encoded.
#[tracing::instrument(level = "debug", skip_all)]
pub fn pixels_to_pik(
    params: &CompressParams, io: &CodecInOut, pool: &WorkerPool, info: Option<&mut PikInfo>
) -> Result<ByteVec>
{
    io.validate()?;

    let bits_per_sample = io.original_bits_per_sample
        .ok_or_else(|| Error::invalid("missing original bit depth"))?;

    let mut header = FileHeader::new(io.size(), bits_per_sample);

    let preview = if params.preview {
        let (size, bytes) = encode_preview(io);
        header.preview = Some(Preview { size_bits: bytes.len() as u64 * 8, size });
        bytes
    }
    else { Vec::new() };

    let (extension_bits, header_bits) = can_encode(&header)?;
    tracing::trace!(header_bits, extension_bits, "file header size");

    let mut encoder = MultipassEncoder::new(params, io.size(), pool);
    encoder.encode_image(io)?;
    let (passes, pass_infos) = encoder.finish()?;

    let header_bytes = RoundingMode::Up.divide(header_bits, 8);
    let mut writer = BitWriter::with_capacity_bits((header_bytes + preview.len() + passes.len()) * 8);

    write_file_header(&header, extension_bits, &mut writer)?;
    writer.zero_pad_to_byte();
    debug_assert_eq!(writer.bytes().len(), header_bytes, "file header size mismatch");

    writer.write_bytes(&preview);
    writer.write_bytes(&passes);

    let bytes = writer.into_bytes();
    tracing::debug!(bytes = bytes.len(), passes = pass_infos.len(), "encoded image");

    if let Some(info) = info {
        *info = PikInfo { header_bytes, preview_bytes: preview.len(), passes: pass_infos };
    }

    Ok(bytes)
}

/// A downsampled copy of the image, as zlib compressed interleaved 8 bit sRGB samples.
/// Returns the size of the preview and the compressed bytes.
fn encode_preview(io: &CodecInOut) -> (Vec2<usize>, ByteVec) {
    let size = io.size();
    let preview_size = size.divide(PREVIEW_DOWNSAMPLING, RoundingMode::Up);
    let bounds = Rect::from_size(size);

    let mut samples = Vec::with_capacity(preview_size.area() * 3);

    for y in 0 .. preview_size.height() {
        for x in 0 .. preview_size.width() {
            let area = Rect::new(Vec2(x, y) * PREVIEW_DOWNSAMPLING, Vec2(PREVIEW_DOWNSAMPLING, PREVIEW_DOWNSAMPLING));
            let end = Vec2(area.end().x().min(bounds.end().x()), area.end().y().min(bounds.end().y()));
            let area = Rect::new(area.position, end - area.position);

            for plane in &io.image.planes {
                let sum: f32 = area.y_range()
                    .map(|y| plane.row(y)[area.x_range()].iter().sum::<f32>())
                    .sum();

                samples.push(srgb8_from_linear_approximate(sum / area.size.area() as f32));
            }
        }
    }

    (preview_size, deflate(&samples))
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::image::{Image3F, Plane};

    #[test]
    fn preview_averages_blocks(){
        let size = Vec2(20, 9);
        let plane = Plane::from_fn(size, |position| if position.x() < 8 { 255.0 } else { 0.0 });
        let io = CodecInOut::new(Image3F::from_planes([ plane.clone(), plane.clone(), plane ]), Some(8));

        let (preview_size, bytes) = encode_preview(&io);
        assert_eq!(preview_size, Vec2(3, 2));

        let samples = crate::compression::inflate(&bytes, 3 * 2 * 3).unwrap();
        assert_eq!(&samples[.. 9], &[ 255, 255, 255, 0, 0, 0, 0, 0, 0 ]);
    }

    #[test]
    fn images_without_bit_depth_are_rejected(){
        let io = CodecInOut::new(Image3F::new(Vec2(4, 4)), None);
        let result = pixels_to_pik(&CompressParams::default(), &io, &WorkerPool::sequential(), None);
        assert!(matches!(result, Err(Error::Invalid(_))));
    }
}
