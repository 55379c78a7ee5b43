
//! Encodes the passes of an image.

use smallvec::SmallVec;

use crate::block::parallel::WorkerPool;
use crate::block::{AcStrategyImage, FrequencyTier, BLOCK_DIM};
use crate::compression::csc::{rgb_image_to_ycbcr, ColorCorrelation};
use crate::compression::entropy::encode_values;
use crate::compression::prediction::{compute_dc, compute_prediction_residuals, predict_lf_for_encoder};
use crate::compression::quantizer::Quantizer;
use crate::compression::{gradient, lossless, ByteVec};
use crate::error::{Error, Result, UnitResult};
use crate::image::params::{CompressParams, Override, PassParams};
use crate::image::{CodecInOut, Image3F, Plane, Rect};
use crate::math::{RoundingMode, Vec2};
use crate::meta::pass::{write_pass, PassHeader};
use super::decode::{decode_lossy_residual, merge_lossy_residual};
use super::{forward_transform, PassDescriptor, PassInfo, PassScope, TransformManager};


/// Targets at or above this distance enable the adaptive reconstruction filter by default.
const ADAPTIVE_RECONSTRUCTION_DISTANCE: f32 = 1.5;


/// Appends passes to a pik file, one at a time.
#[derive(Debug)]
pub struct MultipassEncoder<'p> {
    params: &'p CompressParams,
    pool: &'p WorkerPool,
    manager: TransformManager,
    bytes: ByteVec,
    passes: SmallVec<[PassInfo; 4]>,
}

impl<'p> MultipassEncoder<'p> {

    /// Prepare the passes of an image with the specified size.
    pub fn new(params: &'p CompressParams, size: Vec2<usize>, pool: &'p WorkerPool) -> Self {
        let mut manager = TransformManager::new(size);

        manager.use_adaptive_reconstruction(
            params.adaptive_reconstruction.apply(params.butteraugli_distance >= ADAPTIVE_RECONSTRUCTION_DISTANCE)
        );

        MultipassEncoder { params, pool, manager, bytes: Vec::new(), passes: SmallVec::new() }
    }

    /// The accumulated state of the passes so far.
    pub fn manager(&self) -> &TransformManager { &self.manager }

    /// The accumulated state of the passes so far.
    pub fn manager_mut(&mut self) -> &mut TransformManager { &mut self.manager }

    /// Encode every pass of the image, in the order selected by the compression parameters.
    pub fn encode_image(&mut self, io: &CodecInOut) -> UnitResult {
        let target = &io.image;
        let params = self.params;
        let defaults = params.pass_params();

        if let Some(path) = &params.lossless_base {
            let base = CodecInOut::read_from_file(path)?;

            if base.size() != target.size() {
                return Err(Error::invalid("lossless base size mismatch"));
            }

            self.encode_pass(&base.image, PassParams { is_last: false, lossless: true, adaptive_reconstruction: false, ..defaults })?;
            self.encode_pass(target, PassParams { is_last: true, lossless: false, ..defaults })?;
        }

        else if !params.progressive_mode {
            self.manager.set_scope(PassScope::Full);
            self.encode_pass(target, defaults)?;
        }

        else {
            self.manager.set_scope(PassScope::LfOnly);
            self.encode_pass(target, PassParams { is_last: false, lossless: false, adaptive_reconstruction: false, ..defaults })?;

            // only the final high frequency pass may enable adaptive reconstruction again
            let refinement = PassParams {
                is_last: false, lossless: false, adaptive_reconstruction: false,
                gradient: false, predict_lf: false, predict_hf: false,
                ..defaults
            };

            let mut high_frequency_scope = PassScope::HfOnly;

            if let Some(extractor) = &params.saliency_extractor {
                let map = extractor.saliency_map(io)?;
                self.manager.set_saliency_map(map, params.saliency_threshold);

                self.manager.set_scope(PassScope::SalientHfOnly);
                self.encode_pass(target, refinement)?;
                high_frequency_scope = PassScope::NonSalientHfOnly;
            }

            self.manager.set_scope(high_frequency_scope);
            self.encode_pass(target, PassParams {
                is_last: !params.lossless_mode,
                adaptive_reconstruction: defaults.adaptive_reconstruction,
                ..refinement
            })?;

            if params.lossless_mode {
                self.manager.set_scope(PassScope::Full);
                self.encode_pass(target, PassParams { is_last: true, lossless: true, ..refinement })?;
            }
        }

        Ok(())
    }

    /// Append a pass that refines the reconstruction towards `target`, a linear image of the image size.
    pub fn encode_pass(&mut self, target: &Image3F, pass: PassParams) -> UnitResult {
        if target.size() != self.manager.reconstruction().size() {
            return Err(Error::invalid("pass image size mismatch"));
        }

        let descriptor = self.manager.begin_pass(pass.is_last)?;

        let (header, payload, reconstruction) = if pass.lossless {
            let payload = lossless::encode(target, Some(self.manager.reconstruction()))?;
            let header = PassHeader { is_last: descriptor.is_last, scope: descriptor.scope, lossless: true, ..PassHeader::default() };
            (header, payload, target.clone())
        }
        else {
            self.encode_lossy_pass(descriptor, pass, target)?
        };

        let bytes = write_pass(&header, &payload)?;

        tracing::debug!(
            scope = ?descriptor.scope, is_last = descriptor.is_last, lossless = header.lossless,
            adaptive_reconstruction = header.adaptive_reconstruction, bytes = bytes.len(),
            "encoded pass"
        );

        self.passes.push(PassInfo {
            descriptor, lossless: header.lossless,
            adaptive_reconstruction: header.adaptive_reconstruction,
            byte_size: bytes.len(),
        });

        self.bytes.extend_from_slice(&bytes);
        self.manager.replace_reconstruction(reconstruction);
        self.manager.finish_pass(descriptor);
        Ok(())
    }

    /// The passes and their statistics. Fails unless the last pass has been encoded.
    pub fn finish(self) -> Result<(ByteVec, SmallVec<[PassInfo; 4]>)> {
        if !self.manager.is_last_pass() {
            return Err(Error::invalid("no last pass"));
        }

        Ok((self.bytes, self.passes))
    }

    /// Returns the header, the payload, and the reconstruction the decoder will compute.
    fn encode_lossy_pass(
        &self, descriptor: PassDescriptor, pass: PassParams, target: &Image3F
    ) -> Result<(PassHeader, ByteVec, Image3F)>
    {
        let params = self.params;
        let scope = descriptor.scope;
        let quantizer = Quantizer::for_distance(params.butteraugli_distance);

        let size = target.size();
        let padded_size = size.map(|length| RoundingMode::Up.to_multiple(length, BLOCK_DIM));
        let size_in_blocks = padded_size.divide(BLOCK_DIM, RoundingMode::Down);
        let everything = Rect::from_size(size_in_blocks);

        let mut residual = target.clone();
        residual.sub_assign(self.manager.reconstruction());
        let mut residual = residual.padded(padded_size);
        rgb_image_to_ycbcr(&mut residual);

        let strategy =
            if params.adaptive_block_size { AcStrategyImage::choose(&residual, params.butteraugli_distance) }
            else { AcStrategyImage::new(size_in_blocks) };

        let mut coefficients = forward_transform(&residual, &strategy, self.pool)?;

        let mut header = PassHeader {
            is_last: descriptor.is_last,
            scope,
            lossless: false,
            adaptive_reconstruction: false,
            gradient: pass.gradient && scope.codes_dc(),
            predict_lf: pass.predict_lf && scope.codes_lf(),
            predict_hf: pass.predict_hf && scope.codes_lf() && scope.codes_hf(),
            quantizer_scale: quantizer.scale(),
            color_correlation: ColorCorrelation::NONE,
            payload_size: 0,
        };

        let mut values: Vec<i32> = strategy.ids().into_iter().map(|id| id as i32).collect();

        if scope.codes_dc() {
            let exact_dc = compute_dc(&coefficients, &strategy, everything);

            if params.color_correlation {
                header.color_correlation = ColorCorrelation::estimate(&exact_dc);
            }

            let (quantized, dc) = quantize_dc(&exact_dc, header.color_correlation, quantizer);

            for plane in &quantized {
                if header.gradient { values.extend(gradient::residuals(plane)); }
                else { values.extend_from_slice(plane.samples()); }
            }

            let mut dc2x2 = Image3F::new(size_in_blocks * 2);

            predict_lf_for_encoder(
                header.predict_lf, header.predict_hf, &dc, &strategy,
                header.color_correlation, quantizer, &mut coefficients, &mut dc2x2
            );

            if header.predict_hf {
                compute_prediction_residuals(&dc2x2, &strategy, &mut coefficients);
            }
        }

        let transforms: Vec<_> = strategy.first_blocks(everything).collect();

        if scope.codes_lf() {
            for (channel, plane) in coefficients.planes.iter().enumerate() {
                for &(block, transform) in &transforms {
                    let origin = block * BLOCK_DIM;

                    for v in 0 .. transform.lf_size() {
                        for u in 0 .. transform.lf_size() {
                            if transform.tier(u, v) != FrequencyTier::Lf { continue; }

                            let step = quantizer.ac_step(channel, transform, u, v);
                            values.push(Quantizer::quantize(plane.get(origin.x() + u, origin.y() + v), step));
                        }
                    }
                }
            }
        }

        let coded = if scope.is_saliency_split() {
            let salient = self.manager.salient_transforms(&strategy)?;
            let code_salient = scope == PassScope::SalientHfOnly;
            let coded: Vec<bool> = salient.into_iter().map(|salient| salient == code_salient).collect();
            values.extend(coded.iter().map(|&coded| coded as i32));
            coded
        }
        else {
            vec![ true; transforms.len() ]
        };

        if scope.codes_hf() {
            for (channel, plane) in coefficients.planes.iter().enumerate() {
                for (&(block, transform), _) in transforms.iter().zip(&coded).filter(|(_, &coded)| coded) {
                    let origin = block * BLOCK_DIM;
                    let size = transform.block_size();

                    for v in 0 .. size {
                        for u in 0 .. size {
                            if transform.tier(u, v) != FrequencyTier::Hf { continue; }

                            let step = quantizer.ac_step(channel, transform, u, v);
                            values.push(Quantizer::quantize(plane.get(origin.x() + u, origin.y() + v), step));
                        }
                    }
                }
            }
        }

        let payload = encode_values(&values);

        // reconstruct exactly as the decoder will
        let residual = decode_lossy_residual(&header, &payload, size, self.pool)?;
        let previous = self.manager.reconstruction();
        let merge = |adaptive_reconstruction: bool| {
            merge_lossy_residual(previous, &residual, adaptive_reconstruction, quantizer, self.pool)
        };

        let (adaptive_reconstruction, reconstruction) =
            if !pass.adaptive_reconstruction { (false, merge(false)?) }
            else {
                match (params.adaptive_reconstruction, &params.comparator) {
                    (Override::Default, Some(comparator)) => {
                        let plain = merge(false)?;
                        let filtered = merge(true)?;

                        let plain_score = comparator.compare(target, &plain)?.score;
                        let filtered_score = comparator.compare(target, &filtered)?.score;
                        tracing::trace!(plain_score, filtered_score, "adaptive reconstruction decision");

                        if filtered_score <= plain_score { (true, filtered) }
                        else { (false, plain) }
                    },

                    _ => {
                        let enabled = self.manager.uses_adaptive_reconstruction();
                        (enabled, merge(enabled)?)
                    },
                }
            };

        header.adaptive_reconstruction = adaptive_reconstruction;
        Ok((header, payload, reconstruction))
    }
}

/// Quantize the DC image, decorrelating chroma from the quantized luma.
/// Returns the quantized planes and the dequantized, still decorrelated, DC image.
fn quantize_dc(dc: &Image3F, color_correlation: ColorCorrelation, quantizer: Quantizer) -> ([Plane<i32>; 3], Image3F) {
    let size = dc.size();
    let luma_step = quantizer.dc_step(0);

    let quantized_luma = Plane::from_fn(size, |position| {
        Quantizer::quantize(dc.plane(0).get(position.x(), position.y()), luma_step)
    });

    let dequantized_luma = Plane::from_fn(size, |position| {
        Quantizer::dequantize(quantized_luma.get(position.x(), position.y()), luma_step)
    });

    let quantize_chroma = |channel: usize| Plane::from_fn(size, |position| {
        let (x, y) = (position.x(), position.y());
        let value = color_correlation.decorrelate(channel, dc.plane(channel).get(x, y), dequantized_luma.get(x, y));
        Quantizer::quantize(value, quantizer.dc_step(channel))
    });

    let quantized = [ quantized_luma, quantize_chroma(1), quantize_chroma(2) ];

    let mut channel = 0;
    let dequantized = quantized.clone().map(|plane| {
        let step = quantizer.dc_step(channel);
        channel += 1;
        Plane::from_fn(size, |position| Quantizer::dequantize(plane.get(position.x(), position.y()), step))
    });

    (quantized, Image3F::from_planes(dequantized))
}


#[cfg(test)]
mod test {
    use super::*;

    fn gradient_image(size: Vec2<usize>) -> Image3F {
        let plane = |scale: f32| Plane::from_fn(size, |position| {
            scale * (position.x() + 2 * position.y()) as f32 % 255.0
        });

        Image3F::from_planes([ plane(1.0), plane(0.5), plane(0.25) ])
    }

    #[test]
    fn chroma_is_decorrelated_from_quantized_luma(){
        let size = Vec2(6, 5);
        let luma = Plane::from_fn(size, |position| (position.x() * 7 + position.y()) as f32);
        let chroma = Plane::from_fn(size, |position| 0.5 * luma.get(position.x(), position.y()) + 1.0);
        let dc = Image3F::from_planes([ luma, chroma.clone(), chroma ]);

        let quantizer = Quantizer::for_distance(1.0);
        let color_correlation = ColorCorrelation::estimate(&dc);
        assert_eq!(color_correlation.luma_to_cb, 32);

        let (quantized, mut dequantized) = quantize_dc(&dc, color_correlation, quantizer);
        assert!(quantized[1].samples().iter().all(|&value| value.abs() <= 3));

        color_correlation.restore_dc(&mut dequantized);
        for channel in 0 .. 3 {
            for (&restored, &original) in dequantized.plane(channel).samples().iter().zip(dc.plane(channel).samples()) {
                assert!((restored - original).abs() <= quantizer.dc_step(channel));
            }
        }
    }

    #[test]
    fn pass_after_the_last_pass_is_rejected(){
        let image = gradient_image(Vec2(24, 17));
        let params = CompressParams::default();
        let pool = WorkerPool::sequential();

        let mut encoder = MultipassEncoder::new(&params, image.size(), &pool);
        encoder.encode_pass(&image, params.pass_params()).unwrap();
        assert!(encoder.encode_pass(&image, params.pass_params()).is_err());

        let (bytes, passes) = encoder.finish().unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].byte_size, bytes.len());
    }

    #[test]
    fn unfinished_passes_are_rejected(){
        let image = gradient_image(Vec2(8, 8));
        let params = CompressParams::default();
        let pool = WorkerPool::sequential();

        let mut encoder = MultipassEncoder::new(&params, image.size(), &pool);
        encoder.encode_pass(&image, PassParams { is_last: false, ..params.pass_params() }).unwrap();
        assert!(encoder.finish().is_err());
    }

    #[test]
    fn reconstruction_approaches_the_target(){
        let image = gradient_image(Vec2(50, 37));
        let params = CompressParams::default();
        let pool = WorkerPool::new(2);

        let mut encoder = MultipassEncoder::new(&params, image.size(), &pool);
        encoder.encode_pass(&image, params.pass_params()).unwrap();

        let reconstruction = encoder.manager().reconstruction();
        let mut error = image.clone();
        error.sub_assign(reconstruction);

        let max = error.planes.iter().flat_map(|plane| plane.samples()).fold(0.0_f32, |max, &value| max.max(value.abs()));
        assert!(max < 20.0, "max error {}", max);
    }
}
