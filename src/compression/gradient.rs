
//! Lossless coding of quantized DC samples against the clamped gradient predictor.
//! All arithmetic is on integers, so encoder and decoder always agree.
//! Residuals wrap around, which keeps the coding exact for any input.

use crate::error::Result;
use crate::image::Plane;
use crate::math::Vec2;


/// `W + N - NW`, clamped to the range spanned by `W` and `N`.
/// Falls back to the only available neighbour at the image border.
fn predict(plane: &Plane<i32>, x: usize, y: usize) -> i32 {
    match (x, y) {
        (0, 0) => 0,
        (_, 0) => plane.get(x - 1, 0),
        (0, _) => plane.get(0, y - 1),
        _ => {
            let west = plane.get(x - 1, y) as i64;
            let north = plane.get(x, y - 1) as i64;
            let north_west = plane.get(x - 1, y - 1) as i64;
            let clamped = (west + north - north_west).max(west.min(north)).min(west.max(north));
            clamped as i32
        }
    }
}

/// The prediction residual of every sample, row by row.
pub fn residuals(plane: &Plane<i32>) -> Vec<i32> {
    let mut residuals = Vec::with_capacity(plane.size().area());

    for y in 0 .. plane.height() {
        for x in 0 .. plane.width() {
            residuals.push(plane.get(x, y).wrapping_sub(predict(plane, x, y)));
        }
    }

    residuals
}

/// Rebuild the samples from their residuals.
pub fn reconstruct(size: Vec2<usize>, mut next_residual: impl FnMut() -> Result<i32>) -> Result<Plane<i32>> {
    let mut plane = Plane::new(size);

    for y in 0 .. size.height() {
        for x in 0 .. size.width() {
            let value = next_residual()?.wrapping_add(predict(&plane, x, y));
            plane.set(x, y, value);
        }
    }

    Ok(plane)
}
