
//! Splits an image into passes and merges them back.
//!
//! Every pass refines the image reconstructed from the previous passes.
//! The `TransformManager` tracks this reconstruction and the state of the pass sequence
//! on both sides, so that encoder and decoder always agree on what the next pass refines.

pub mod decode;
pub mod encode;

use smallvec::SmallVec;

use crate::block::parallel::WorkerPool;
use crate::block::{tiles, AcStrategyImage, BLOCK_DIM};
use crate::compression::dct::{forward_dct_2d, inverse_dct_2d};
use crate::error::{Error, Result};
use crate::image::{Image3F, PlaneF, Rect};
use crate::math::Vec2;

pub use crate::meta::pass::PassScope;


/// The position of a pass in the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PassDescriptor {

    /// Whether no further pass follows.
    pub is_last: bool,

    /// Which coefficients the pass contains.
    pub scope: PassScope,
}

/// Describes a pass after it has been encoded or decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PassInfo {

    /// Position and scope of the pass.
    pub descriptor: PassDescriptor,

    /// Whether the pass stores exact samples.
    pub lossless: bool,

    /// Whether the adaptive reconstruction filter was applied after the pass.
    pub adaptive_reconstruction: bool,

    /// The number of bytes of pass header and payload.
    pub byte_size: usize,
}

/// Statistics about a pik file, collected while encoding or decoding.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PikInfo {

    /// The number of bytes of the file header, including padding.
    pub header_bytes: usize,

    /// The number of bytes of the preview.
    pub preview_bytes: usize,

    /// Every pass, in file order.
    pub passes: SmallVec<[PassInfo; 4]>,
}

impl PikInfo {

    /// The number of bytes of the whole file.
    pub fn total_bytes(&self) -> usize {
        self.header_bytes + self.preview_bytes
            + self.passes.iter().map(|pass| pass.byte_size).sum::<usize>()
    }
}


/// Accumulates the passes of one image.
#[derive(Clone, Debug)]
pub struct TransformManager {
    scope: PassScope,
    saliency: Option<(PlaneF, f32)>,
    adaptive_reconstruction: bool,
    last_pass_done: bool,
    pass_count: usize,
    reconstruction: Image3F,
}

impl TransformManager {

    /// Start with a black image of the specified size.
    pub fn new(size: Vec2<usize>) -> Self {
        TransformManager {
            scope: PassScope::Full,
            saliency: None,
            adaptive_reconstruction: false,
            last_pass_done: false,
            pass_count: 0,
            reconstruction: Image3F::new(size),
        }
    }

    /// Start with a black image of the specified size,
    /// failing if the image cannot be allocated.
    pub fn try_new(size: Vec2<usize>) -> Result<Self> {
        Ok(TransformManager { reconstruction: Image3F::try_new(size)?, ..Self::new(Vec2(0, 0)) })
    }

    /// The scope of the next pass.
    pub fn set_scope(&mut self, scope: PassScope) { self.scope = scope; }

    /// The scope of the next pass.
    pub fn scope(&self) -> PassScope { self.scope }

    /// Use a saliency map of the image size to split high frequency passes.
    pub fn set_saliency_map(&mut self, map: PlaneF, threshold: f32) {
        self.saliency = Some((map, threshold));
    }

    /// Whether each transform is salient, in raster order of their top left blocks.
    /// A transform is salient if the saliency of any of its pixels inside the image exceeds the threshold.
    pub fn salient_transforms(&self, strategy: &AcStrategyImage) -> Result<Vec<bool>> {
        let (map, threshold) = self.saliency.as_ref()
            .ok_or_else(|| Error::invalid("saliency split without saliency map"))?;

        let image = Rect::from_size(self.reconstruction.size());
        if map.size() != image.size {
            return Err(Error::invalid("saliency map size mismatch"));
        }

        let transforms = strategy.first_blocks(Rect::from_size(strategy.size())).map(|(block, transform)| {
            let start = block * BLOCK_DIM;
            let end = start + Vec2(transform.block_size(), transform.block_size());
            let end = Vec2(end.x().min(image.size.width()), end.y().min(image.size.height()));

            (start.y() .. end.y()).any(|y| {
                // padded transforms may lie completely outside of the image
                start.x() < end.x() && map.row(y)[start.x() .. end.x()].iter().any(|&saliency| saliency > *threshold)
            })
        });

        Ok(transforms.collect())
    }

    /// Whether lossy passes enable the adaptive reconstruction filter by default.
    pub fn use_adaptive_reconstruction(&mut self, enabled: bool) {
        self.adaptive_reconstruction = enabled;
    }

    /// Whether lossy passes enable the adaptive reconstruction filter by default.
    pub fn uses_adaptive_reconstruction(&self) -> bool { self.adaptive_reconstruction }

    /// Describe the next pass. Fails once the last pass has been processed.
    pub fn begin_pass(&self, is_last: bool) -> Result<PassDescriptor> {
        if self.last_pass_done {
            return Err(Error::invalid("pass after the last pass"));
        }

        Ok(PassDescriptor { is_last, scope: self.scope })
    }

    /// Record that the pass has been merged into the reconstruction.
    pub fn finish_pass(&mut self, descriptor: PassDescriptor) {
        debug_assert!(!self.last_pass_done, "pass after the last pass");
        self.pass_count += 1;
        self.last_pass_done = descriptor.is_last;
    }

    /// Whether the last pass has been processed.
    pub fn is_last_pass(&self) -> bool { self.last_pass_done }

    /// The number of processed passes.
    pub fn pass_count(&self) -> usize { self.pass_count }

    /// The image reconstructed from the processed passes, linear RGB.
    pub fn reconstruction(&self) -> &Image3F { &self.reconstruction }

    /// Replace the reconstruction, after a lossless pass.
    pub fn replace_reconstruction(&mut self, image: Image3F) {
        debug_assert_eq!(image.size(), self.reconstruction.size(), "reconstruction size changed");
        self.reconstruction = image;
    }

    /// Consume the manager, returning the reconstruction.
    pub fn into_reconstruction(self) -> Image3F { self.reconstruction }
}


/// Apply `transform` to every transform of a tile, in place.
/// `tile` is in blocks of the image, `coefficients` covers the tile.
fn transform_tile(
    coefficients: &mut Image3F, strategy: &AcStrategyImage, tile: Rect,
    transform: fn(usize, &mut [f32])
) {
    for plane in coefficients.planes.iter_mut() {
        for (block, block_strategy) in strategy.first_blocks(tile) {
            let size = block_strategy.block_size();
            let area = Rect::new((block - tile.position) * BLOCK_DIM, Vec2(size, size));

            let mut values = plane.crop(area).into_samples();
            transform(size, &mut values);
            plane.paste(&PlaneF::from_samples(area.size, values), area.position);
        }
    }
}

/// Transform all tiles of an image on the worker pool.
/// The size of `image` must be the size of `strategy` in pixels.
fn transform_image(
    image: &Image3F, strategy: &AcStrategyImage, pool: &WorkerPool,
    transform: fn(usize, &mut [f32])
) -> Result<Image3F>
{
    debug_assert_eq!(image.size(), strategy.size() * BLOCK_DIM, "image does not match strategy");

    let tiles = tiles(strategy.size());
    let transformed = pool.run_parallel_for(tiles.len(), |index| {
        let pixels = tiles[index].scaled(BLOCK_DIM);
        let mut tile = image.crop(pixels);
        transform_tile(&mut tile, strategy, tiles[index], transform);
        Ok(tile)
    })?;

    let mut result = Image3F::new(image.size());
    for (tile, coefficients) in tiles.iter().zip(&transformed) {
        result.paste(coefficients, tile.position * BLOCK_DIM);
    }

    Ok(result)
}

/// The coefficients of every transform, stored in place.
pub fn forward_transform(image: &Image3F, strategy: &AcStrategyImage, pool: &WorkerPool) -> Result<Image3F> {
    transform_image(image, strategy, pool, forward_dct_2d)
}

/// The pixels of every transform, inverse of `forward_transform`.
pub fn inverse_transform(coefficients: &Image3F, strategy: &AcStrategyImage, pool: &WorkerPool) -> Result<Image3F> {
    transform_image(coefficients, strategy, pool, inverse_dct_2d)
}
