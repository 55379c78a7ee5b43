
//! Decodes the passes of an image.

use crate::block::parallel::WorkerPool;
use crate::block::{tiles, AcStrategyImage, FrequencyTier, BLOCK_DIM};
use crate::compression::csc::{rgb_image_to_ycbcr, ycbcr_image_to_rgb};
use crate::compression::dct::inverse_dct_2d;
use crate::compression::entropy::ValueReader;
use crate::compression::prediction::{add_predictions, compute_llf, update_lf_for_decoder};
use crate::compression::quantizer::Quantizer;
use crate::compression::{adaptive_reconstruction, gradient, lossless, Bytes};
use crate::error::{Error, Result};
use crate::image::{Image3F, Plane, Rect};
use crate::io::BitReader;
use crate::math::{RoundingMode, Vec2};
use crate::meta::pass::{read_pass, PassHeader};
use super::{transform_tile, PassInfo, TransformManager};


/// Reads the passes of a pik file, one at a time.
#[derive(Debug)]
pub struct MultipassDecoder<'p> {
    pool: &'p WorkerPool,
    manager: TransformManager,
}

impl<'p> MultipassDecoder<'p> {

    /// Prepare decoding an image with the specified size.
    /// Fails if the image cannot be allocated.
    pub fn new(size: Vec2<usize>, pool: &'p WorkerPool) -> Result<Self> {
        Ok(MultipassDecoder { pool, manager: TransformManager::try_new(size)? })
    }

    /// The accumulated state of the passes so far.
    pub fn manager(&self) -> &TransformManager { &self.manager }

    /// Read the next pass and merge it into the reconstruction.
    /// Fails if the previous pass was the last one.
    pub fn decode_pass(&mut self, reader: &mut BitReader<'_>) -> Result<PassInfo> {
        let start = reader.bit_position();

        let (header, payload) = read_pass(reader)?;
        self.manager.set_scope(header.scope);
        let descriptor = self.manager.begin_pass(header.is_last)?;

        let size = self.manager.reconstruction().size();

        let reconstruction = if header.lossless {
            lossless::decode(payload, size, Some(self.manager.reconstruction()))?
        }
        else {
            let residual = decode_lossy_residual(&header, payload, size, self.pool)?;
            let quantizer = Quantizer::from_scale(header.quantizer_scale);

            merge_lossy_residual(
                self.manager.reconstruction(), &residual,
                header.adaptive_reconstruction, quantizer, self.pool
            )?
        };

        self.manager.replace_reconstruction(reconstruction);
        self.manager.finish_pass(descriptor);

        let byte_size = (reader.bit_position() - start) / 8;
        tracing::debug!(scope = ?descriptor.scope, is_last = descriptor.is_last, lossless = header.lossless, bytes = byte_size, "decoded pass");

        Ok(PassInfo {
            descriptor, byte_size,
            lossless: header.lossless,
            adaptive_reconstruction: header.adaptive_reconstruction,
        })
    }

    /// Whether the last pass has been decoded.
    pub fn is_finished(&self) -> bool { self.manager.is_last_pass() }

    /// The image reconstructed from the decoded passes, linear RGB.
    pub fn into_image(self) -> Image3F { self.manager.into_reconstruction() }
}


/// Coded values per block at most: strategy id and saliency bit, then dc and coefficients per channel.
const MAX_VALUES_PER_BLOCK: usize = 2 + 3 * (1 + BLOCK_DIM * BLOCK_DIM);

/// The working color space image of a lossy pass, padded to whole blocks.
/// `size` is the size of the image in pixels.
pub(crate) fn decode_lossy_residual(header: &PassHeader, payload: Bytes<'_>, size: Vec2<usize>, pool: &WorkerPool) -> Result<Image3F> {
    let scope = header.scope;
    let quantizer = Quantizer::from_scale(header.quantizer_scale);

    let padded_size = size.map(|length| RoundingMode::Up.to_multiple(length, BLOCK_DIM));
    let size_in_blocks = padded_size.divide(BLOCK_DIM, RoundingMode::Down);
    let everything = Rect::from_size(size_in_blocks);

    let mut values = ValueReader::new(payload, size_in_blocks.area().saturating_mul(MAX_VALUES_PER_BLOCK))?;

    let strategy = AcStrategyImage::from_ids(size_in_blocks, || {
        u32::try_from(values.next_value()?).map_err(|_| Error::invalid("undefined block strategy"))
    })?;

    let mut dc = Image3F::new(size_in_blocks);

    if scope.codes_dc() {
        for (channel, plane) in dc.planes.iter_mut().enumerate() {
            let quantized = if header.gradient {
                gradient::reconstruct(size_in_blocks, || values.next_value())?
            }
            else {
                let samples = (0 .. size_in_blocks.area())
                    .map(|_| values.next_value())
                    .collect::<Result<Vec<i32>>>()?;

                Plane::from_samples(size_in_blocks, samples)
            };

            let step = quantizer.dc_step(channel);
            *plane = Plane::from_fn(size_in_blocks, |position| {
                Quantizer::dequantize(quantized.get(position.x(), position.y()), step)
            });
        }

        header.color_correlation.restore_dc(&mut dc);
    }

    let llf = compute_llf(&dc, &strategy, everything);
    let transforms: Vec<_> = strategy.first_blocks(everything).collect();
    let mut ac64 = Image3F::new(padded_size);

    if scope.codes_lf() {
        for (channel, plane) in ac64.planes.iter_mut().enumerate() {
            for &(block, transform) in &transforms {
                let origin = block * BLOCK_DIM;

                for v in 0 .. transform.lf_size() {
                    for u in 0 .. transform.lf_size() {
                        if transform.tier(u, v) != FrequencyTier::Lf { continue; }

                        let step = quantizer.ac_step(channel, transform, u, v);
                        plane.set(origin.x() + u, origin.y() + v, Quantizer::dequantize(values.next_value()?, step));
                    }
                }
            }
        }
    }

    let coded: Vec<bool> =
        if scope.is_saliency_split() {
            transforms.iter()
                .map(|_| match values.next_value()? {
                    0 => Ok(false),
                    1 => Ok(true),
                    _ => Err(Error::invalid("saliency mask value")),
                })
                .collect::<Result<_>>()?
        }
        else {
            vec![ true; transforms.len() ]
        };

    if scope.codes_hf() {
        for (channel, plane) in ac64.planes.iter_mut().enumerate() {
            for (&(block, transform), _) in transforms.iter().zip(&coded).filter(|(_, &coded)| coded) {
                let origin = block * BLOCK_DIM;
                let size = transform.block_size();

                for v in 0 .. size {
                    for u in 0 .. size {
                        if transform.tier(u, v) != FrequencyTier::Hf { continue; }

                        let step = quantizer.ac_step(channel, transform, u, v);
                        plane.set(origin.x() + u, origin.y() + v, Quantizer::dequantize(values.next_value()?, step));
                    }
                }
            }
        }
    }

    values.finish()?;

    let tiles = tiles(size_in_blocks);

    let low_frequencies = pool.run_parallel_for(tiles.len(), |index| {
        let tile = tiles[index];
        let mut coefficients = ac64.crop(tile.scaled(BLOCK_DIM));
        let mut dc2x2 = Image3F::new(tile.size * 2);
        let mut lf2x2 = Image3F::new(tile.size * 2);

        update_lf_for_decoder(
            tile, header.predict_lf, header.predict_hf, &strategy, &llf,
            &mut coefficients, &mut dc2x2, &mut lf2x2
        );

        Ok((coefficients, dc2x2))
    })?;

    let mut dc2x2 = Image3F::new(size_in_blocks * 2);
    for (tile, (coefficients, tile_dc2x2)) in tiles.iter().zip(&low_frequencies) {
        ac64.paste(coefficients, tile.position * BLOCK_DIM);
        dc2x2.paste(tile_dc2x2, tile.position * 2);
    }

    drop(low_frequencies);

    let pixels = pool.run_parallel_for(tiles.len(), |index| {
        let tile = tiles[index];
        let mut coefficients = ac64.crop(tile.scaled(BLOCK_DIM));

        if header.predict_hf {
            add_predictions(&dc2x2, &strategy, tile, &mut coefficients);
        }

        transform_tile(&mut coefficients, &strategy, tile, inverse_dct_2d);
        Ok(coefficients)
    })?;

    let mut residual = Image3F::new(padded_size);
    for (tile, tile_pixels) in tiles.iter().zip(&pixels) {
        residual.paste(tile_pixels, tile.position * BLOCK_DIM);
    }

    Ok(residual)
}

/// Add the decoded residual of a lossy pass to the reconstruction,
/// optionally applying the adaptive reconstruction filter to the sum.
/// Returns the new reconstruction, linear RGB of the size of `reconstruction`.
pub(crate) fn merge_lossy_residual(
    reconstruction: &Image3F, residual: &Image3F, adaptive_reconstruction: bool,
    quantizer: Quantizer, pool: &WorkerPool
) -> Result<Image3F>
{
    let size = reconstruction.size();

    let mut merged = reconstruction.padded(residual.size());
    rgb_image_to_ycbcr(&mut merged);
    merged.add_assign(residual);

    if adaptive_reconstruction {
        adaptive_reconstruction::apply(&mut merged, quantizer, pool)?;
    }

    ycbcr_image_to_rgb(&mut merged);
    Ok(merged.crop(Rect::from_size(size)))
}
