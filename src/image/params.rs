
//! Options of the encoder and the decoder.
//! Construct them with `default()` and refine them with the builder methods.

use std::path::PathBuf;
use std::sync::Arc;

use crate::oracle::{Comparator, SaliencyExtractor};


/// Overrides a decision that is otherwise made by the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Override {

    /// Let the encoder decide.
    #[default]
    Default,

    /// Always enable.
    On,

    /// Always disable.
    Off,
}

impl Override {

    /// Whether the feature is enabled, given what the encoder would choose.
    pub fn apply(self, default: bool) -> bool {
        match self {
            Override::Default => default,
            Override::On => true,
            Override::Off => false,
        }
    }
}


/// Specify how an image is compressed.
#[derive(Clone, Debug)]
pub struct CompressParams {

    /// The target distance. At 1.0, differences are barely visible.
    /// Larger values produce smaller files.
    pub butteraugli_distance: f32,

    /// Split the image into a low frequency pass and a high frequency pass,
    /// so that decoders can show a preview before everything has arrived.
    pub progressive_mode: bool,

    /// Finish with a pass that makes the decoded image exactly equal to the input.
    pub lossless_mode: bool,

    /// An image file that is stored losslessly first. All further passes refine it.
    /// Must have the same dimensions as the compressed image.
    pub lossless_base: Option<PathBuf>,

    /// Rates which blocks are important. Progressive files then send
    /// the high frequencies of the salient blocks first.
    pub saliency_extractor: Option<Arc<dyn SaliencyExtractor>>,

    /// Blocks whose saliency exceeds this value are salient.
    pub saliency_threshold: f32,

    /// Judges whether the adaptive reconstruction filter improves the image.
    pub comparator: Option<Arc<dyn Comparator>>,

    /// Whether the decoder smooths quantization noise.
    pub adaptive_reconstruction: Override,

    /// Whether DC samples are coded against the gradient predictor.
    pub gradient: Override,

    /// Whether low frequencies are predicted from the DC image.
    pub predict_lf: bool,

    /// Whether high frequencies are predicted from the low frequencies.
    pub predict_hf: bool,

    /// Whether chroma DC is predicted from luma DC.
    pub color_correlation: bool,

    /// Whether larger transforms are used in flat areas.
    pub adaptive_block_size: bool,

    /// Whether a small thumbnail is stored before the passes.
    pub preview: bool,
}

impl Default for CompressParams {
    fn default() -> Self {
        CompressParams {
            butteraugli_distance: 1.0,
            progressive_mode: false,
            lossless_mode: false,
            lossless_base: None,
            saliency_extractor: None,
            saliency_threshold: 0.5,
            comparator: None,
            adaptive_reconstruction: Override::Default,
            gradient: Override::Default,
            predict_lf: true,
            predict_hf: true,
            color_correlation: true,
            adaptive_block_size: true,
            preview: false,
        }
    }
}

impl CompressParams {

    /// Store the image exactly.
    pub fn lossless() -> Self {
        CompressParams { lossless_mode: true, ..Self::default() }
    }

    /// Split the image into a low and a high frequency pass.
    pub fn progressive() -> Self {
        CompressParams { progressive_mode: true, ..Self::default() }
    }

    /// Set the target distance.
    pub fn with_distance(self, butteraugli_distance: f32) -> Self {
        Self { butteraugli_distance, ..self }
    }

    /// Finish with an exact pass.
    pub fn with_lossless_mode(self) -> Self { Self { lossless_mode: true, ..self } }

    /// Split the image into low and high frequency passes.
    pub fn with_progressive_mode(self) -> Self { Self { progressive_mode: true, ..self } }

    /// Store the image file losslessly before refining it.
    pub fn with_lossless_base(self, path: impl Into<PathBuf>) -> Self {
        Self { lossless_base: Some(path.into()), ..self }
    }

    /// Send the high frequencies of salient blocks first.
    pub fn with_saliency(self, extractor: Arc<dyn SaliencyExtractor>, threshold: f32) -> Self {
        Self { saliency_extractor: Some(extractor), saliency_threshold: threshold, ..self }
    }

    /// Let the comparator decide about the adaptive reconstruction filter.
    pub fn with_comparator(self, comparator: Arc<dyn Comparator>) -> Self {
        Self { comparator: Some(comparator), ..self }
    }

    /// Force the adaptive reconstruction filter on or off.
    pub fn with_adaptive_reconstruction(self, adaptive_reconstruction: Override) -> Self {
        Self { adaptive_reconstruction, ..self }
    }

    /// Force the gradient DC predictor on or off.
    pub fn with_gradient(self, gradient: Override) -> Self {
        Self { gradient, ..self }
    }

    /// Disable all coefficient and chroma predictions.
    pub fn without_predictions(self) -> Self {
        Self { predict_lf: false, predict_hf: false, color_correlation: false, ..self }
    }

    /// Use the smallest transform everywhere.
    pub fn with_fixed_block_size(self) -> Self { Self { adaptive_block_size: false, ..self } }

    /// Store a thumbnail before the passes.
    pub fn with_preview(self) -> Self { Self { preview: true, ..self } }

    /// The options of a pass, before the sequencer adjusts them.
    pub fn pass_params(&self) -> PassParams {
        PassParams {
            is_last: true,
            lossless: self.lossless_mode,
            adaptive_reconstruction: true,
            gradient: self.gradient.apply(true),
            predict_lf: self.predict_lf,
            predict_hf: self.predict_hf,
        }
    }
}


/// The options of a single pass, as adjusted by the pass sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassParams {

    /// Whether the pass completes the file.
    pub is_last: bool,

    /// Whether the pass stores exact samples.
    pub lossless: bool,

    /// Whether the pass may enable the adaptive reconstruction filter.
    pub adaptive_reconstruction: bool,

    /// Whether DC samples are coded against the gradient predictor.
    pub gradient: bool,

    /// Whether low frequencies are predicted.
    pub predict_lf: bool,

    /// Whether high frequencies are predicted.
    pub predict_hf: bool,
}


/// Specify how an image is decompressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecompressParams {

    /// Fail if bytes remain after the last pass.
    pub check_decompressed_size: bool,

    /// Stop after this many passes, even if more follow.
    pub max_passes: Option<usize>,

    /// Fail before allocating an image with more pixels.
    pub max_pixels: Option<usize>,
}

impl Default for DecompressParams {
    fn default() -> Self {
        DecompressParams { check_decompressed_size: true, max_passes: None, max_pixels: None }
    }
}

impl DecompressParams {

    /// Accept bytes after the last pass.
    pub fn lenient(self) -> Self { Self { check_decompressed_size: false, ..self } }

    /// Decode only the first passes of a progressive file.
    pub fn with_max_passes(self, max_passes: usize) -> Self {
        Self { max_passes: Some(max_passes), ..self }
    }

    /// Refuse images larger than this.
    pub fn with_max_pixels(self, max_pixels: usize) -> Self {
        Self { max_pixels: Some(max_pixels), ..self }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overrides(){
        assert!(Override::Default.apply(true));
        assert!(!Override::Default.apply(false));
        assert!(Override::On.apply(false));
        assert!(!Override::Off.apply(true));
    }

    #[test]
    fn constructors(){
        let lossless = CompressParams::lossless();
        assert!(lossless.lossless_mode && !lossless.progressive_mode);

        let progressive = CompressParams::progressive().with_distance(2.0).with_preview();
        assert!(progressive.progressive_mode && progressive.preview);
        assert_eq!(progressive.butteraugli_distance, 2.0);

        let pass = CompressParams::default().with_gradient(Override::Off).without_predictions().pass_params();
        assert!(!pass.gradient && !pass.predict_lf && !pass.predict_hf && !pass.lossless);
    }
}
