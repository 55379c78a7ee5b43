
//! Color space conversion.
//!
//! Lossy passes operate on ITU-R BT.709 luma and chroma of the linear samples.
//! The zero point is shifted so that Cb=Cr=0 for black (R=G=B=0),
//! rather than the traditional Cb=Cr=0.5.
//! Chroma DC can additionally be predicted from luma DC, see `ColorCorrelation`.

use crate::image::Image3F;

mod forward {
    pub const Y_R: f32 = 0.2126;
    pub const Y_G: f32 = 0.7152;
    pub const Y_B: f32 = 0.0722;

    pub const CB_R: f32 = -0.1146;
    pub const CB_G: f32 = -0.3854;
    pub const CB_B: f32 = 0.5;

    pub const CR_R: f32 = 0.5;
    pub const CR_G: f32 = -0.4542;
    pub const CR_B: f32 = -0.0458;
}

mod inverse {
    pub const R_CR: f32 = 1.5747;
    pub const G_CB: f32 = -0.1873;
    pub const G_CR: f32 = -0.4682;
    pub const B_CB: f32 = 1.8556;
}

/// Convert RGB to Y'CbCr.
#[inline]
pub fn rgb_to_ycbcr(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let y = forward::Y_R * r + forward::Y_G * g + forward::Y_B * b;
    let cb = forward::CB_R * r + forward::CB_G * g + forward::CB_B * b;
    let cr = forward::CR_R * r + forward::CR_G * g + forward::CR_B * b;
    (y, cb, cr)
}

/// Convert Y'CbCr to RGB.
#[inline]
pub fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> (f32, f32, f32) {
    let r = y + inverse::R_CR * cr;
    let g = y + inverse::G_CB * cb + inverse::G_CR * cr;
    let b = y + inverse::B_CB * cb;
    (r, g, b)
}

/// Convert every pixel of an RGB image to Y'CbCr, in place.
pub fn rgb_image_to_ycbcr(image: &mut Image3F) {
    map_pixels(image, rgb_to_ycbcr)
}

/// Convert every pixel of a Y'CbCr image to RGB, in place.
pub fn ycbcr_image_to_rgb(image: &mut Image3F) {
    map_pixels(image, ycbcr_to_rgb)
}

fn map_pixels(image: &mut Image3F, convert: impl Fn(f32, f32, f32) -> (f32, f32, f32)) {
    let [first, second, third] = &mut image.planes;

    let samples = first.samples_mut().iter_mut()
        .zip(second.samples_mut().iter_mut())
        .zip(third.samples_mut().iter_mut());

    for ((a, b), c) in samples {
        let (x, y, z) = convert(*a, *b, *c);
        *a = x; *b = y; *c = z;
    }
}


/// Predicts chroma DC from luma DC.
/// The factors are stored in steps of 1/64.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ColorCorrelation {

    /// How much of luma is contained in the blue difference channel.
    pub luma_to_cb: i8,

    /// How much of luma is contained in the red difference channel.
    pub luma_to_cr: i8,
}

impl ColorCorrelation {

    /// No correlation.
    pub const NONE: ColorCorrelation = ColorCorrelation { luma_to_cb: 0, luma_to_cr: 0 };

    const STEPS_PER_UNIT: f32 = 64.0;

    /// The luma factor of the channel, zero for luma itself.
    pub fn factor(self, channel: usize) -> f32 {
        match channel {
            1 => self.luma_to_cb as f32 / Self::STEPS_PER_UNIT,
            2 => self.luma_to_cr as f32 / Self::STEPS_PER_UNIT,
            _ => 0.0,
        }
    }

    /// Least squares fit of the chroma DC against the luma DC.
    pub fn estimate(dc: &Image3F) -> Self {
        let luma = dc.plane(0).samples();
        let count = luma.len().max(1) as f64;
        let luma_mean = luma.iter().map(|&value| value as f64).sum::<f64>() / count;

        let luma_variance: f64 = luma.iter()
            .map(|&value| (value as f64 - luma_mean).powi(2))
            .sum();

        let fit = |channel: usize| -> i8 {
            if luma_variance < 1e-6 { return 0; }

            let chroma = dc.plane(channel).samples();
            let chroma_mean = chroma.iter().map(|&value| value as f64).sum::<f64>() / count;

            let covariance: f64 = luma.iter().zip(chroma)
                .map(|(&luma, &chroma)| (luma as f64 - luma_mean) * (chroma as f64 - chroma_mean))
                .sum();

            let steps = (covariance / luma_variance * Self::STEPS_PER_UNIT as f64).round();
            steps.max(i8::MIN as f64).min(i8::MAX as f64) as i8
        };

        ColorCorrelation { luma_to_cb: fit(1), luma_to_cr: fit(2) }
    }

    /// Remove the luma prediction from a chroma value.
    #[inline]
    pub fn decorrelate(self, channel: usize, value: f32, luma: f32) -> f32 {
        value - self.factor(channel) * luma
    }

    /// Add the luma prediction back to a chroma value.
    #[inline]
    pub fn restore(self, channel: usize, value: f32, luma: f32) -> f32 {
        value + self.factor(channel) * luma
    }

    /// Restore both chroma planes of a decorrelated DC image, in place.
    pub fn restore_dc(self, dc: &mut Image3F) {
        let [luma, cb, cr] = &mut dc.planes;

        for (channel, chroma) in [(1, cb), (2, cr)] {
            for (value, &luma) in chroma.samples_mut().iter_mut().zip(luma.samples()) {
                *value = self.restore(channel, *value, luma);
            }
        }
    }
}
