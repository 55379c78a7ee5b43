
//! Uniform quantization of DC samples and transform coefficients.
//! All step sizes derive from a single scale, which is stored in each pass header
//! with 16 bit float precision. Encoder and decoder therefore always use identical steps.

use half::f16;
use crate::block::{AcStrategy, FrequencyTier};


/// Relative step size of luma, blue and red difference channels.
const CHANNEL_WEIGHTS: [f32; 3] = [ 1.0, 1.5, 1.5 ];

const MIN_SCALE: f32 = 0.01;
const MAX_SCALE: f32 = 1000.0;


/// Computes step sizes from the target distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantizer {
    scale: f32,
}

impl Quantizer {

    /// Steps for a target distance, where 1.0 is barely visible.
    pub fn for_distance(distance: f32) -> Self {
        Self::from_scale(distance)
    }

    /// Steps for a scale as stored in a pass header.
    pub fn from_scale(scale: f32) -> Self {
        let clamped = if scale.is_finite() { scale.max(MIN_SCALE).min(MAX_SCALE) } else { 1.0 };
        Quantizer { scale: f16::from_f32(clamped).to_f32() }
    }

    /// The scale, exactly representable as a 16 bit float.
    pub fn scale(self) -> f32 { self.scale }

    /// The step of DC samples.
    pub fn dc_step(self, channel: usize) -> f32 {
        0.5 * self.scale * CHANNEL_WEIGHTS[channel]
    }

    /// The step of the coefficient with frequency `(u, v)` of a transform.
    pub fn ac_step(self, channel: usize, strategy: AcStrategy, u: usize, v: usize) -> f32 {
        let size = strategy.block_size() as f32;

        let relative = match strategy.tier(u, v) {
            FrequencyTier::Llf | FrequencyTier::Lf => 2.0,
            FrequencyTier::Hf => 2.5 + 2.5 * (u + v) as f32 / size,
        };

        relative * self.scale * CHANNEL_WEIGHTS[channel] / size
    }

    /// The typical pixel error caused by quantizing the high frequencies of a channel.
    pub fn noise_amplitude(self, channel: usize) -> f32 {
        0.75 * self.scale * CHANNEL_WEIGHTS[channel]
    }

    /// Round a value to the nearest multiple of the step.
    #[inline]
    pub fn quantize(value: f32, step: f32) -> i32 {
        (value / step).round() as i32
    }

    /// The value of a quantized multiple of the step.
    #[inline]
    pub fn dequantize(quantized: i32, step: f32) -> f32 {
        quantized as f32 * step
    }

    /// Quantize and immediately dequantize.
    #[inline]
    pub fn round_trip(value: f32, step: f32) -> f32 {
        Self::dequantize(Self::quantize(value, step), step)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scale_is_stored_exactly(){
        let quantizer = Quantizer::for_distance(1.3);
        let stored = f16::from_f32(quantizer.scale()).to_f32();
        assert_eq!(Quantizer::from_scale(stored), quantizer);

        assert_eq!(Quantizer::for_distance(0.0).scale(), f16::from_f32(MIN_SCALE).to_f32());
        assert_eq!(Quantizer::for_distance(f32::NAN).scale(), 1.0);
    }

    #[test]
    fn higher_frequencies_use_larger_steps(){
        let quantizer = Quantizer::for_distance(1.0);

        for &strategy in &AcStrategy::ALL {
            let n = strategy.block_size();
            let lf = quantizer.ac_step(0, strategy, 1, 0);
            let low_hf = quantizer.ac_step(0, strategy, strategy.lf_size(), 0);
            let high_hf = quantizer.ac_step(0, strategy, n - 1, n - 1);
            assert!(lf < low_hf && low_hf < high_hf);
            assert!(quantizer.ac_step(1, strategy, 1, 0) > lf);
        }
    }

    #[test]
    fn quantization_error_is_at_most_half_a_step(){
        let step = 0.37;
        for index in -100 .. 100 {
            let value = index as f32 * 0.113;
            assert!((Quantizer::round_trip(value, step) - value).abs() <= step * 0.5 + 1e-6);
        }
    }
}
