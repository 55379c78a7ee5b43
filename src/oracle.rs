
//! Image quality oracles consulted by the encoder.
//! A `Comparator` scores how different two images look,
//! a `SaliencyExtractor` rates how important each pixel is.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::image::{CodecInOut, Image3F, PlaneF};


/// The result of comparing two images.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {

    /// The overall distance. Smaller is better, zero for identical images.
    pub score: f32,

    /// The distance at each pixel.
    pub distance_map: PlaneF,
}

/// Scores the difference between an original image and a reconstruction.
/// Both images are linear, in the range `0..=255`.
pub trait Comparator: Debug + Send + Sync {

    /// Compare the two images. Fails if their sizes differ.
    fn compare(&self, reference: &Image3F, candidate: &Image3F) -> Result<Comparison>;
}

/// Rates the importance of each pixel of an image.
pub trait SaliencyExtractor: Debug + Send + Sync {

    /// A plane of the same size as the image, with values from zero to one.
    fn saliency_map(&self, image: &CodecInOut) -> Result<PlaneF>;
}


/// Euclidean distance of the samples at each pixel,
/// with the root mean square of those distances as the score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SquaredErrorComparator;

impl Comparator for SquaredErrorComparator {
    fn compare(&self, reference: &Image3F, candidate: &Image3F) -> Result<Comparison> {
        if reference.size() != candidate.size() {
            return Err(Error::invalid("compared image sizes differ"));
        }

        let distance_map = PlaneF::from_fn(reference.size(), |position| {
            let squared: f32 = reference.planes.iter().zip(&candidate.planes)
                .map(|(reference, candidate)| {
                    let difference = reference.get(position.x(), position.y()) - candidate.get(position.x(), position.y());
                    difference * difference
                })
                .sum();

            squared.sqrt()
        });

        let count = distance_map.samples().len().max(1) as f64;
        let mean_squared = distance_map.samples().iter().map(|&distance| (distance as f64).powi(2)).sum::<f64>() / count;

        Ok(Comparison { score: mean_squared.sqrt() as f32, distance_map })
    }
}


/// Rates pixels by how much detail a blur would remove from them.
#[derive(Clone, Debug)]
pub struct DetailSaliency {

    /// Measures the difference between the image and its blurred version.
    pub comparator: Arc<dyn Comparator>,

    /// The blur radius in pixels.
    pub radius: usize,
}

impl Default for DetailSaliency {
    fn default() -> Self {
        DetailSaliency { comparator: Arc::new(SquaredErrorComparator), radius: 4 }
    }
}

impl SaliencyExtractor for DetailSaliency {
    fn saliency_map(&self, image: &CodecInOut) -> Result<PlaneF> {
        let blurred = image.image.map_planes(|plane| box_blur(plane, self.radius));
        let mut map = self.comparator.compare(&image.image, &blurred)?.distance_map;

        let max = map.samples().iter().copied().fold(0.0_f32, f32::max);
        if max > 0.0 {
            for value in map.samples_mut() { *value /= max; }
        }

        Ok(map)
    }
}

/// Mean of the square neighbourhood, clamped at the borders.
fn box_blur(plane: &PlaneF, radius: usize) -> PlaneF {
    let size = plane.size();

    let mean = |samples: &dyn Fn(usize) -> f32, position: usize, length: usize| -> f32 {
        let start = position.saturating_sub(radius);
        let end = (position + radius + 1).min(length);
        (start .. end).map(samples).sum::<f32>() / (end - start) as f32
    };

    let horizontal = PlaneF::from_fn(size, |position| {
        let row = plane.row(position.y());
        mean(&|x| row[x], position.x(), size.width())
    });

    PlaneF::from_fn(size, |position| {
        mean(&|y| horizontal.get(position.x(), y), position.y(), size.height())
    })
}
