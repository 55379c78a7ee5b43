
//! Prediction of transform coefficients from lower frequencies.
//!
//! The DC image determines the lowest frequencies (LLF) of every transform.
//! The low frequencies (LF) are predicted by upsampling the LLF to twice the DC resolution,
//! smoothing, and transforming back. The reconstructed low frequencies, again at twice
//! the DC resolution, predict the high frequencies (HF) after bilinear upsampling.
//!
//! Coefficients are stored in place: coefficient `(u, v)` of the transform whose top left
//! block is `(bx, by)` is the sample at `(8 bx + u, 8 by + v)`.
//! Images at twice the DC resolution ("2x2" images) store the `L×L` values of that transform,
//! where `L = N/4`, at `(2 bx + u, 2 by + v)`.
//!
//! Unless documented otherwise, every plane argument covers exactly the `rect` argument,
//! scaled by the resolution of the plane: one sample per block for DC and LLF images,
//! two for 2x2 images, eight for coefficient images.

use smallvec::SmallVec;

use crate::block::{AcStrategy, AcStrategyImage, FrequencyTier, BLOCK_DIM, MAX_COVERED_BLOCKS};
use crate::compression::csc::ColorCorrelation;
use crate::compression::dct::{forward_dct_2d, inverse_dct_2d, resample_scale};
use crate::compression::quantizer::Quantizer;
use crate::image::{Image3F, PlaneF, Rect};
use crate::math::Vec2;


/// Large enough for the low frequencies of the largest transform.
type LowBlock = SmallVec<[f32; 64]>;

/// Weights of the separable smoothing kernel.
const SMOOTHING: [f32; 3] = [ 0.25, 0.5, 0.25 ];

/// Pixels per sample of a 2x2 image.
const UPSAMPLING: usize = BLOCK_DIM / 2;


/// Factor between coefficient `(u, v)` of the transform and the same coefficient
/// of the transform box-downsampled to `resampled_size`.
#[inline]
fn resample_scale_2d(strategy: AcStrategy, resampled_size: usize, u: usize, v: usize) -> f32 {
    let size = strategy.block_size();
    resample_scale(u, size, resampled_size) * resample_scale(v, size, resampled_size)
}

#[inline]
fn local_block(block: Vec2<usize>, rect: Rect) -> Vec2<usize> {
    block - rect.position
}

fn debug_assert_fits(strategy: AcStrategy, block: Vec2<usize>, rect: Rect) {
    debug_assert!(
        rect.contains_rect(Rect::new(block, Vec2(strategy.covered_blocks(), strategy.covered_blocks()))),
        "transform crosses the border of the processed area"
    );
}


/// The lowest frequency coefficients of every transform starting in `rect`, computed from its DC samples.
/// The result has the layout of the DC image.
pub fn compute_llf_plane(dc: &PlaneF, strategy: &AcStrategyImage, rect: Rect) -> PlaneF {
    debug_assert_eq!(dc.size(), rect.size, "dc does not cover the area");
    let mut llf = PlaneF::new(rect.size);

    for (block, transform) in strategy.first_blocks(rect) {
        debug_assert_fits(transform, block, rect);

        let size = transform.llf_size();
        let local = local_block(block, rect);

        let mut values: LowBlock = (0 .. size * size)
            .map(|index| dc.get(local.x() + index % size, local.y() + index / size))
            .collect();

        forward_dct_2d(size, &mut values);

        for v in 0 .. size {
            for u in 0 .. size {
                let value = values[v * size + u] / resample_scale_2d(transform, size, u, v);
                llf.set(local.x() + u, local.y() + v, value);
            }
        }
    }

    llf
}

/// The DC samples of every transform starting in `rect`, computed from its lowest frequency coefficients.
/// Inverse of `compute_llf_plane`.
pub fn compute_dc_plane(coefficients: &PlaneF, strategy: &AcStrategyImage, rect: Rect) -> PlaneF {
    debug_assert_eq!(coefficients.size(), rect.size * BLOCK_DIM, "coefficients do not cover the area");
    let mut dc = PlaneF::new(rect.size);

    for (block, transform) in strategy.first_blocks(rect) {
        let size = transform.llf_size();
        let local = local_block(block, rect);
        let origin = local * BLOCK_DIM;

        let mut values: LowBlock = (0 .. size * size)
            .map(|index| {
                let (u, v) = (index % size, index / size);
                coefficients.get(origin.x() + u, origin.y() + v) * resample_scale_2d(transform, size, u, v)
            })
            .collect();

        inverse_dct_2d(size, &mut values);

        for (index, &value) in values.iter().enumerate() {
            dc.set(local.x() + index % size, local.y() + index / size, value);
        }
    }

    dc
}

/// See `compute_llf_plane`.
pub fn compute_llf(dc: &Image3F, strategy: &AcStrategyImage, rect: Rect) -> Image3F {
    dc.map_planes(|plane| compute_llf_plane(plane, strategy, rect))
}

/// See `compute_dc_plane`.
pub fn compute_dc(coefficients: &Image3F, strategy: &AcStrategyImage, rect: Rect) -> Image3F {
    coefficients.map_planes(|plane| compute_dc_plane(plane, strategy, rect))
}


/// Weighted mean of the 3×3 neighbourhood, with coordinates clamped to the plane.
pub(crate) fn smooth_sample(plane: &PlaneF, x: usize, y: usize) -> f32 {
    let clamp = |position: usize, offset: usize, size: usize| (position + offset).saturating_sub(1).min(size - 1);
    let mut sum = 0.0;

    for (offset_y, &weight_y) in SMOOTHING.iter().enumerate() {
        let row = plane.row(clamp(y, offset_y, plane.height()));
        let mut row_sum = 0.0;

        for (offset_x, &weight_x) in SMOOTHING.iter().enumerate() {
            row_sum += weight_x * row[clamp(x, offset_x, plane.width())];
        }

        sum += weight_y * row_sum;
    }

    sum
}

/// Predict the low frequencies of every transform in `rect` from their lowest frequencies.
///
/// `tmp2x2` receives the upsampled LLF, `lf2x2` the predicted `L×L` coefficients.
/// The LLF cells of `lf2x2` hold the exact LLF.
pub fn predict_lf_plane(strategy: &AcStrategyImage, rect: Rect, llf: &PlaneF, tmp2x2: &mut PlaneF, lf2x2: &mut PlaneF) {
    debug_assert_eq!(llf.size(), rect.size, "llf does not cover the area");
    debug_assert_eq!(tmp2x2.size(), rect.size * 2, "tmp2x2 does not cover the area");
    debug_assert_eq!(lf2x2.size(), rect.size * 2, "lf2x2 does not cover the area");

    for (block, transform) in strategy.first_blocks(rect) {
        debug_assert_fits(transform, block, rect);

        let (llf_size, lf_size) = (transform.llf_size(), transform.lf_size());
        let local = local_block(block, rect);
        let origin = local * 2;

        let mut values: LowBlock = SmallVec::from_elem(0.0, lf_size * lf_size);
        for v in 0 .. llf_size {
            for u in 0 .. llf_size {
                values[v * lf_size + u] = llf.get(local.x() + u, local.y() + v) * resample_scale_2d(transform, lf_size, u, v);
            }
        }

        inverse_dct_2d(lf_size, &mut values);

        for (index, &value) in values.iter().enumerate() {
            tmp2x2.set(origin.x() + index % lf_size, origin.y() + index / lf_size, value);
        }
    }

    for (block, transform) in strategy.first_blocks(rect) {
        let (llf_size, lf_size) = (transform.llf_size(), transform.lf_size());
        let local = local_block(block, rect);
        let origin = local * 2;

        let mut values: LowBlock = (0 .. lf_size * lf_size)
            .map(|index| smooth_sample(tmp2x2, origin.x() + index % lf_size, origin.y() + index / lf_size))
            .collect();

        forward_dct_2d(lf_size, &mut values);

        for v in 0 .. lf_size {
            for u in 0 .. lf_size {
                let value =
                    if u < llf_size && v < llf_size { llf.get(local.x() + u, local.y() + v) }
                    else { values[v * lf_size + u] / resample_scale_2d(transform, lf_size, u, v) };

                lf2x2.set(origin.x() + u, origin.y() + v, value);
            }
        }
    }
}

/// See `predict_lf_plane`.
pub fn predict_lf(strategy: &AcStrategyImage, rect: Rect, llf: &Image3F, tmp2x2: &mut Image3F, lf2x2: &mut Image3F) {
    for channel in 0 .. 3 {
        predict_lf_plane(strategy, rect, llf.plane(channel), tmp2x2.plane_mut(channel), lf2x2.plane_mut(channel));
    }
}


/// Convert the reconstructed `L×L` low frequencies of a transform, in place,
/// to samples at twice the DC resolution.
fn low_frequencies_to_samples(transform: AcStrategy, values: &mut [f32]) {
    let lf_size = transform.lf_size();

    for v in 0 .. lf_size {
        for u in 0 .. lf_size {
            values[v * lf_size + u] *= resample_scale_2d(transform, lf_size, u, v);
        }
    }

    inverse_dct_2d(lf_size, values);
}

fn store_low_block(plane: &mut PlaneF, origin: Vec2<usize>, size: usize, values: &[f32]) {
    for (index, &value) in values.iter().enumerate() {
        plane.set(origin.x() + index % size, origin.y() + index / size, value);
    }
}

/// Prepare the coefficients of the whole image for coding.
///
/// `dc` is the DC image as the decoder will see it, dequantized and with the color correlation removed.
/// The LLF cells of `ac64` are replaced by the LLF derived from `dc`.
/// If `predict_lf`, the LF cells of `ac64` are replaced by their prediction residuals.
/// If `predict_hf`, `dc2x2` receives the reconstructed low frequencies exactly as the decoder
/// will compute them after quantization of the LF cells.
/// Returns the LF prediction, which is zero unless `predict_lf`.
#[allow(clippy::too_many_arguments)]
pub fn predict_lf_for_encoder(
    predict_lf: bool, predict_hf: bool, dc: &Image3F, strategy: &AcStrategyImage,
    color_correlation: ColorCorrelation, quantizer: Quantizer,
    ac64: &mut Image3F, dc2x2: &mut Image3F,
) -> Image3F
{
    let rect = Rect::from_size(strategy.size());
    debug_assert_eq!(ac64.size(), rect.size * BLOCK_DIM, "coefficients do not cover the image");
    debug_assert_eq!(dc2x2.size(), rect.size * 2, "dc2x2 does not cover the image");

    let mut dc = dc.clone();
    color_correlation.restore_dc(&mut dc);

    let llf = compute_llf(&dc, strategy, rect);
    let mut lf2x2 = Image3F::new(rect.size * 2);

    if predict_lf {
        let mut tmp2x2 = Image3F::new(rect.size * 2);
        self::predict_lf(strategy, rect, &llf, &mut tmp2x2, &mut lf2x2);
    }

    for channel in 0 .. 3 {
        let coefficients = ac64.plane_mut(channel);

        for (block, transform) in strategy.first_blocks(rect) {
            let (llf_size, lf_size) = (transform.llf_size(), transform.lf_size());
            let origin = block * BLOCK_DIM;
            let origin2x2 = block * 2;

            let mut reconstructed: LowBlock = SmallVec::from_elem(0.0, lf_size * lf_size);

            for v in 0 .. lf_size {
                for u in 0 .. lf_size {
                    let coefficient = coefficients.get_mut(origin.x() + u, origin.y() + v);

                    reconstructed[v * lf_size + u] = if u < llf_size && v < llf_size {
                        *coefficient = llf.plane(channel).get(block.x() + u, block.y() + v);
                        *coefficient
                    }
                    else {
                        let step = quantizer.ac_step(channel, transform, u, v);

                        if predict_lf {
                            let prediction = lf2x2.plane(channel).get(origin2x2.x() + u, origin2x2.y() + v);
                            *coefficient -= prediction;
                            Quantizer::round_trip(*coefficient, step) + prediction
                        }
                        else {
                            Quantizer::round_trip(*coefficient, step)
                        }
                    };
                }
            }

            if predict_hf {
                low_frequencies_to_samples(transform, &mut reconstructed);
                store_low_block(dc2x2.plane_mut(channel), origin2x2, lf_size, &reconstructed);
            }
        }
    }

    lf2x2
}


/// Reconstruct the lowest and low frequencies of one tile in the decoder.
///
/// `tile` is in blocks of the whole image. `strategy` and `llf` cover the whole image,
/// `ac64`, `dc2x2` and `lf2x2` cover the tile only. The LLF cells of `ac64` are set from `llf`,
/// and if `predict_lf`, the LF predictions are added to the decoded residuals and stored in `lf2x2`.
/// If `predict_hf`, `dc2x2` receives the reconstructed low frequencies.
///
/// The result equals the corresponding part of the whole image computation.
#[allow(clippy::too_many_arguments)]
pub fn update_lf_for_decoder(
    tile: Rect, predict_lf: bool, predict_hf: bool, strategy: &AcStrategyImage, llf: &Image3F,
    ac64: &mut Image3F, dc2x2: &mut Image3F, lf2x2: &mut Image3F,
) {
    let bounds = Rect::from_size(strategy.size());
    debug_assert_eq!(llf.size(), bounds.size, "llf does not cover the image");
    debug_assert_eq!(ac64.size(), tile.size * BLOCK_DIM, "coefficients do not cover the tile");

    if predict_lf {
        // smoothing reads one sample beyond each transform, so neighbouring transforms are predicted as well
        let halo = tile.expanded_aligned(1, MAX_COVERED_BLOCKS, bounds);
        let halo_llf = llf.crop(halo);

        let mut tmp2x2 = Image3F::new(halo.size * 2);
        let mut halo_lf2x2 = Image3F::new(halo.size * 2);
        self::predict_lf(strategy, halo, &halo_llf, &mut tmp2x2, &mut halo_lf2x2);

        *lf2x2 = halo_lf2x2.crop(tile.relative_to(halo.position).scaled(2));
    }

    for channel in 0 .. 3 {
        let coefficients = ac64.plane_mut(channel);

        for (block, transform) in strategy.first_blocks(tile) {
            let (llf_size, lf_size) = (transform.llf_size(), transform.lf_size());
            let local = local_block(block, tile);
            let origin = local * BLOCK_DIM;
            let origin2x2 = local * 2;

            let mut reconstructed: LowBlock = SmallVec::from_elem(0.0, lf_size * lf_size);

            for v in 0 .. lf_size {
                for u in 0 .. lf_size {
                    let coefficient = coefficients.get_mut(origin.x() + u, origin.y() + v);

                    if u < llf_size && v < llf_size {
                        *coefficient = llf.plane(channel).get(block.x() + u, block.y() + v);
                    }
                    else if predict_lf {
                        *coefficient += lf2x2.plane(channel).get(origin2x2.x() + u, origin2x2.y() + v);
                    }

                    reconstructed[v * lf_size + u] = *coefficient;
                }
            }

            if predict_hf {
                low_frequencies_to_samples(transform, &mut reconstructed);
                store_low_block(dc2x2.plane_mut(channel), origin2x2, lf_size, &reconstructed);
            }
        }
    }
}


/// Position of the two source samples and the weight of the second one,
/// for bilinear upsampling of a 2x2 image to pixel resolution.
#[inline]
fn bilinear_position(pixel: usize, source_size: usize) -> (usize, usize, f32) {
    let last = source_size - 1;
    let source = ((pixel as f32 + 0.5) / UPSAMPLING as f32 - 0.5).max(0.0).min(last as f32);
    let first = source.floor() as usize;
    (first, (first + 1).min(last), source - first as f32)
}

#[inline]
fn lerp(first: f32, second: f32, weight: f32) -> f32 {
    first + (second - first) * weight
}

/// The coefficients of the upsampled prediction for the transform starting at `block`.
/// `pred2x2` covers the whole image.
fn predict_hf_block(pred2x2: &PlaneF, block: Vec2<usize>, size: usize) -> Vec<f32> {
    let origin = block * BLOCK_DIM;
    let mut values = Vec::with_capacity(size * size);

    for y in 0 .. size {
        let (top, bottom, weight_y) = bilinear_position(origin.y() + y, pred2x2.height());
        let (top, bottom) = (pred2x2.row(top), pred2x2.row(bottom));

        for x in 0 .. size {
            let (left, right, weight_x) = bilinear_position(origin.x() + x, pred2x2.width());

            values.push(lerp(
                lerp(top[left], top[right], weight_x),
                lerp(bottom[left], bottom[right], weight_x),
                weight_y
            ));
        }
    }

    forward_dct_2d(size, &mut values);
    values
}

fn apply_hf_predictions(pred2x2: &Image3F, strategy: &AcStrategyImage, rect: Rect, coefficients: &mut Image3F, subtract: bool) {
    debug_assert_eq!(pred2x2.size(), strategy.size() * 2, "prediction does not cover the image");
    debug_assert_eq!(coefficients.size(), rect.size * BLOCK_DIM, "coefficients do not cover the area");

    for channel in 0 .. 3 {
        let prediction_plane = pred2x2.plane(channel);
        let coefficients = coefficients.plane_mut(channel);

        for (block, transform) in strategy.first_blocks(rect) {
            let size = transform.block_size();
            let prediction = predict_hf_block(prediction_plane, block, size);
            let origin = local_block(block, rect) * BLOCK_DIM;

            for v in 0 .. size {
                for u in 0 .. size {
                    if transform.tier(u, v) != FrequencyTier::Hf { continue; }

                    let coefficient = coefficients.get_mut(origin.x() + u, origin.y() + v);
                    let predicted = prediction[v * size + u];

                    if subtract { *coefficient -= predicted; }
                    else { *coefficient += predicted; }
                }
            }
        }
    }
}

/// Replace the high frequency coefficients of the whole image by their prediction residuals.
/// `pred2x2` holds the reconstructed low frequencies, see `predict_lf_for_encoder`.
pub fn compute_prediction_residuals(pred2x2: &Image3F, strategy: &AcStrategyImage, coefficients: &mut Image3F) {
    apply_hf_predictions(pred2x2, strategy, Rect::from_size(strategy.size()), coefficients, true)
}

/// Add the high frequency predictions to the decoded residuals of the transforms in `rect`.
/// `pred2x2` covers the whole image, `coefficients` only `rect`.
/// Inverse of `compute_prediction_residuals`.
pub fn add_predictions(pred2x2: &Image3F, strategy: &AcStrategyImage, rect: Rect, coefficients: &mut Image3F) {
    apply_hf_predictions(pred2x2, strategy, rect, coefficients, false)
}
