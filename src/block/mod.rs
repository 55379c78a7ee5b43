
//! Blocks, the transforms covering them, and the tiles that group them for parallel processing.
//! A block is 8×8 pixels. A transform covers one or more blocks in each direction.
//! A tile is 8×8 blocks, and no transform crosses a tile border.

pub mod parallel;

use crate::error::{Error, Result, UnitResult};
use crate::image::{Image3F, Plane, Rect};
use crate::math::{RoundingMode, Vec2};


/// Pixels per block in each direction.
pub const BLOCK_DIM: usize = 8;

/// Blocks per tile in each direction.
pub const TILE_DIM_IN_BLOCKS: usize = 8;

/// Blocks covered by the largest transform in each direction.
pub const MAX_COVERED_BLOCKS: usize = 4;


/// The transform used for an area of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcStrategy {

    /// 8×8 transform covering a single block.
    Dct8,

    /// 16×16 transform covering 2×2 blocks.
    Dct16,

    /// 32×32 transform covering 4×4 blocks.
    Dct32,
}

/// Which of the three coefficient groups a coefficient belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrequencyTier {

    /// Lowest frequencies, carried by the DC image.
    Llf,

    /// Low frequencies, predicted from the DC image.
    Lf,

    /// High frequencies, predicted from the reconstructed low frequencies.
    Hf,
}

impl AcStrategy {

    /// All strategies, ordered by id.
    pub const ALL: [AcStrategy; 3] = [ AcStrategy::Dct8, AcStrategy::Dct16, AcStrategy::Dct32 ];

    /// The number stored in the bitstream.
    pub fn id(self) -> u32 {
        match self {
            AcStrategy::Dct8 => 0,
            AcStrategy::Dct16 => 1,
            AcStrategy::Dct32 => 2,
        }
    }

    /// The strategy stored in the bitstream, if the number is defined.
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// The number of blocks covered in each direction.
    pub fn covered_blocks(self) -> usize {
        match self {
            AcStrategy::Dct8 => 1,
            AcStrategy::Dct16 => 2,
            AcStrategy::Dct32 => 4,
        }
    }

    /// The transform length N.
    pub fn block_size(self) -> usize { self.covered_blocks() * BLOCK_DIM }

    /// Side length of the lowest frequency coefficients, N/8.
    pub fn llf_size(self) -> usize { self.block_size() / 8 }

    /// Side length of the low frequency coefficients including the lowest, N/4.
    pub fn lf_size(self) -> usize { self.block_size() / 4 }

    /// The group of the coefficient with horizontal frequency `u` and vertical frequency `v`.
    pub fn tier(self, u: usize, v: usize) -> FrequencyTier {
        debug_assert!(u < self.block_size() && v < self.block_size(), "coefficient outside of transform");

        let frequency = u.max(v);
        if frequency < self.llf_size() { FrequencyTier::Llf }
        else if frequency < self.lf_size() { FrequencyTier::Lf }
        else { FrequencyTier::Hf }
    }

    /// The number of coefficients in a tier.
    pub fn tier_coefficient_count(self, tier: FrequencyTier) -> usize {
        let llf = self.llf_size() * self.llf_size();
        let lf = self.lf_size() * self.lf_size();
        let all = self.block_size() * self.block_size();

        match tier {
            FrequencyTier::Llf => llf,
            FrequencyTier::Lf => lf - llf,
            FrequencyTier::Hf => all - lf,
        }
    }
}


/// Which transform covers which block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StrategyCell {
    strategy: AcStrategy,
    is_first: bool,
}

impl Default for StrategyCell {
    fn default() -> Self {
        StrategyCell { strategy: AcStrategy::Dct8, is_first: true }
    }
}

/// The transform selection for every block of an image.
/// Every transform is aligned to a multiple of its covered blocks
/// and lies completely inside the image.
#[derive(Clone, Debug, PartialEq)]
pub struct AcStrategyImage {
    cells: Plane<StrategyCell>,
}

impl AcStrategyImage {

    /// Use the smallest transform everywhere.
    pub fn new(size_in_blocks: Vec2<usize>) -> Self {
        AcStrategyImage { cells: Plane::new(size_in_blocks) }
    }

    /// The number of blocks in each direction.
    pub fn size(&self) -> Vec2<usize> { self.cells.size() }

    /// The strategy of the transform covering the block.
    pub fn strategy_at(&self, block: Vec2<usize>) -> AcStrategy {
        self.cells.get(block.x(), block.y()).strategy
    }

    /// Whether the block is the top left block of its transform.
    pub fn is_first(&self, block: Vec2<usize>) -> bool {
        self.cells.get(block.x(), block.y()).is_first
    }

    /// Place a transform with its top left corner at `block`.
    /// Fails if the transform is misaligned, leaves the image,
    /// or overlaps a transform that covers more than one block.
    pub fn set(&mut self, block: Vec2<usize>, strategy: AcStrategy) -> UnitResult {
        let covered = strategy.covered_blocks();

        if block.x() % covered != 0 || block.y() % covered != 0 {
            return Err(Error::invalid("block strategy not aligned"));
        }

        let area = Rect::new(block, Vec2(covered, covered));
        if !self.cells.rect().contains_rect(area) {
            return Err(Error::invalid("block strategy outside of image"));
        }

        for y in area.y_range() {
            for x in area.x_range() {
                if self.cells.get(x, y).strategy != AcStrategy::Dct8 {
                    return Err(Error::invalid("overlapping block strategies"));
                }
            }
        }

        for y in area.y_range() {
            for x in area.x_range() {
                let is_first = x == block.x() && y == block.y();
                self.cells.set(x, y, StrategyCell { strategy, is_first });
            }
        }

        Ok(())
    }

    /// The top left block and strategy of every transform starting inside `rect`, row by row.
    pub fn first_blocks(&self, rect: Rect) -> impl Iterator<Item = (Vec2<usize>, AcStrategy)> + '_ {
        rect.y_range()
            .flat_map(move |y| rect.x_range().map(move |x| Vec2(x, y)))
            .filter_map(move |block| {
                let cell = self.cells.get(block.x(), block.y());
                if cell.is_first { Some((block, cell.strategy)) } else { None }
            })
    }

    /// The strategy id of every transform, in raster order of their top left blocks.
    pub fn ids(&self) -> Vec<u32> {
        self.first_blocks(self.cells.rect()).map(|(_, strategy)| strategy.id()).collect()
    }

    /// Rebuild the strategies from ids in raster order of their top left blocks.
    /// Fails on undefined ids and on transforms that do not fit.
    pub fn from_ids(size_in_blocks: Vec2<usize>, mut next_id: impl FnMut() -> Result<u32>) -> Result<Self> {
        let mut strategies = Self::new(size_in_blocks);
        let mut covered = Plane::<bool>::new(size_in_blocks);

        for y in 0 .. size_in_blocks.height() {
            for x in 0 .. size_in_blocks.width() {
                if covered.get(x, y) { continue; }

                let strategy = AcStrategy::from_id(next_id()?)
                    .ok_or_else(|| Error::invalid("undefined block strategy"))?;

                strategies.set(Vec2(x, y), strategy)?;

                let area = Rect::new(Vec2(x, y), Vec2(strategy.covered_blocks(), strategy.covered_blocks()));
                for covered_y in area.y_range() {
                    for covered_x in area.x_range() {
                        covered.set(covered_x, covered_y, true);
                    }
                }
            }
        }

        Ok(strategies)
    }

    /// Choose larger transforms where the image is flat.
    /// `image` is the padded working image, its size a multiple of the block size.
    pub fn choose(image: &Image3F, distance: f32) -> Self {
        let size_in_blocks = image.size().divide(BLOCK_DIM, RoundingMode::Down);
        let mut strategies = Self::new(size_in_blocks);
        let threshold = 2.0 + 4.0 * distance;

        let is_flat = |block: Vec2<usize>, covered: usize| -> bool {
            let pixels = Rect::new(block * BLOCK_DIM, Vec2(covered, covered) * BLOCK_DIM);

            image.planes.iter().all(|plane| {
                let mut min = f32::INFINITY;
                let mut max = f32::NEG_INFINITY;

                for y in pixels.y_range() {
                    for &value in &plane.row(y)[pixels.x_range()] {
                        min = min.min(value);
                        max = max.max(value);
                    }
                }

                max - min <= threshold
            })
        };

        for strategy in [AcStrategy::Dct32, AcStrategy::Dct16] {
            let covered = strategy.covered_blocks();

            for y in (0 .. size_in_blocks.height()).step_by(covered) {
                for x in (0 .. size_in_blocks.width()).step_by(covered) {
                    let block = Vec2(x, y);
                    let fits = x + covered <= size_in_blocks.width() && y + covered <= size_in_blocks.height();

                    // placing fails where a larger transform was already chosen
                    if fits && is_flat(block, covered) {
                        let _ = strategies.set(block, strategy);
                    }
                }
            }
        }

        strategies
    }
}


/// The tiles covering an area, in blocks, row by row.
pub fn tiles(size_in_blocks: Vec2<usize>) -> Vec<Rect> {
    let bounds = Rect::from_size(size_in_blocks);
    let mut tiles = Vec::new();

    for y in (0 .. size_in_blocks.height()).step_by(TILE_DIM_IN_BLOCKS) {
        for x in (0 .. size_in_blocks.width()).step_by(TILE_DIM_IN_BLOCKS) {
            let end = Vec2(
                (x + TILE_DIM_IN_BLOCKS).min(bounds.end().x()),
                (y + TILE_DIM_IN_BLOCKS).min(bounds.end().y()),
            );

            tiles.push(Rect::new(Vec2(x, y), end - Vec2(x, y)));
        }
    }

    tiles
}
