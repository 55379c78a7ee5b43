
//! Scaled discrete cosine transforms of the sizes used by block strategies.
//!
//! The forward transform produces `X[0] = mean(x)` and
//! `X[k] = √2/N · Σ x[n] cos(πk(2n+1)/2N)`, the inverse computes
//! `x[n] = X[0] + √2 · Σ X[k] cos(πk(2n+1)/2N)`.
//! With this scaling, the first coefficient of any block equals the average of its samples.
//!
//! Short transforms use the cosine table reference implementation,
//! longer transforms use planned transforms from `rustdct`.
//! The choice depends only on the length, so encoder and decoder always agree.

use std::f64::consts::{PI, SQRT_2};
use std::sync::{Arc, OnceLock};

use rustdct::{Dct2, Dct3, DctPlanner, TransformType2And3};
use smallvec::SmallVec;

/// The largest transform length.
pub const MAX_DCT_SIZE: usize = 32;

/// Every supported transform length.
const SIZES: [usize; 6] = [1, 2, 4, 8, 16, 32];

/// Lengths from here on use the planned transforms.
const MIN_PLANNED_SIZE: usize = 8;

type Scratch = SmallVec<[f32; MAX_DCT_SIZE]>;


fn size_index(size: usize) -> usize {
    debug_assert!(SIZES.contains(&size), "unsupported dct size {}", size);
    size.trailing_zeros() as usize
}

/// Whether transforms of this length use the planned fast path.
pub fn uses_planned_transform(size: usize) -> bool {
    size >= MIN_PLANNED_SIZE
}


struct PlannedTransforms {
    forward: Vec<Arc<dyn TransformType2And3<f32>>>,
    inverse: Vec<Arc<dyn TransformType2And3<f32>>>,
}

/// Cached transforms for every supported length.
fn planned() -> &'static PlannedTransforms {
    static PLANNED: OnceLock<PlannedTransforms> = OnceLock::new();

    PLANNED.get_or_init(|| {
        let mut planner = DctPlanner::new();

        PlannedTransforms {
            forward: SIZES.iter().map(|&size| planner.plan_dct2(size)).collect(),
            inverse: SIZES.iter().map(|&size| planner.plan_dct3(size)).collect(),
        }
    })
}


/// Forward transform of a row of samples, in place.
pub fn forward_dct_1d(values: &mut [f32]) {
    let size = values.len();
    if !uses_planned_transform(size) {
        return reference::forward_dct_1d(values);
    }

    planned().forward[size_index(size)].process_dct2(values);

    let scale = (SQRT_2 / size as f64) as f32;
    values[0] /= size as f32;
    for value in &mut values[1..] { *value *= scale; }
}

/// Inverse transform of a row of coefficients, in place.
pub fn inverse_dct_1d(values: &mut [f32]) {
    let size = values.len();
    if !uses_planned_transform(size) {
        return reference::inverse_dct_1d(values);
    }

    // the planned dct-iii halves the first coefficient
    values[0] *= 2.0;
    let scale = SQRT_2 as f32;
    for value in &mut values[1..] { *value *= scale; }

    planned().inverse[size_index(size)].process_dct3(values);
}

/// Forward transform of a square block stored row by row, in place.
pub fn forward_dct_2d(size: usize, block: &mut [f32]) {
    transform_2d(size, block, forward_dct_1d)
}

/// Inverse transform of a square block stored row by row, in place.
pub fn inverse_dct_2d(size: usize, block: &mut [f32]) {
    transform_2d(size, block, inverse_dct_1d)
}

fn transform_2d(size: usize, block: &mut [f32], transform: impl Fn(&mut [f32])) {
    debug_assert_eq!(block.len(), size * size, "block is not square");

    for row in block.chunks_exact_mut(size) {
        transform(row);
    }

    let mut column: Scratch = SmallVec::from_elem(0.0, size);
    for x in 0 .. size {
        for y in 0 .. size { column[y] = block[y * size + x]; }
        transform(&mut column);
        for y in 0 .. size { block[y * size + x] = column[y]; }
    }
}


/// The factor between coefficient `index` of a `size` sample signal
/// and the same coefficient of the signal box-downsampled to `resampled_size` samples.
/// Multiply to go from the long to the short signal, divide to go back.
pub fn resample_scale(index: usize, size: usize, resampled_size: usize) -> f32 {
    debug_assert!(resampled_size <= size && index < resampled_size, "invalid resampling");
    if index == 0 { return 1.0; }

    let factor = (size / resampled_size) as f64;
    let short = (PI * index as f64 / (2 * resampled_size) as f64).sin();
    let long = (PI * index as f64 / (2 * size) as f64).sin();
    (short / (factor * long)) as f32
}


/// The cosine table implementation all other implementations are checked against.
pub mod reference {
    use super::*;

    /// `cos(πk(2n+1)/2N)` at index `k * N + n`, for every supported length.
    fn cosine_table(size: usize) -> &'static [f64] {
        static TABLES: OnceLock<Vec<Vec<f64>>> = OnceLock::new();

        let tables = TABLES.get_or_init(|| {
            SIZES.iter().map(|&size| {
                (0 .. size * size).map(|index| {
                    let (frequency, sample) = (index / size, index % size);
                    (PI * frequency as f64 * (2 * sample + 1) as f64 / (2 * size) as f64).cos()
                }).collect()
            }).collect()
        });

        &tables[size_index(size)]
    }

    /// Forward transform of a row of samples, in place.
    pub fn forward_dct_1d(values: &mut [f32]) {
        let size = values.len();
        let table = cosine_table(size);
        let input: Scratch = values.iter().copied().collect();

        for (frequency, output) in values.iter_mut().enumerate() {
            let cosines = &table[frequency * size .. (frequency + 1) * size];
            let sum: f64 = input.iter().zip(cosines).map(|(&sample, &cosine)| sample as f64 * cosine).sum();
            let scale = if frequency == 0 { 1.0 } else { SQRT_2 };
            *output = (sum * scale / size as f64) as f32;
        }
    }

    /// Inverse transform of a row of coefficients, in place.
    pub fn inverse_dct_1d(values: &mut [f32]) {
        let size = values.len();
        let table = cosine_table(size);
        let input: Scratch = values.iter().copied().collect();

        for (sample, output) in values.iter_mut().enumerate() {
            let mut sum = input[0] as f64;
            for frequency in 1 .. size {
                sum += SQRT_2 * input[frequency] as f64 * table[frequency * size + sample];
            }

            *output = sum as f32;
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn test_signal(size: usize) -> Vec<f32> {
        (0 .. size).map(|index| ((index * 37 + 11) % 23) as f32 - 9.5).collect()
    }

    #[test]
    fn first_coefficient_is_the_mean(){
        for &size in &SIZES {
            let mut values = test_signal(size);
            let mean = values.iter().sum::<f32>() / size as f32;
            forward_dct_1d(&mut values);
            assert!((values[0] - mean).abs() < 1e-4, "size {}", size);
        }
    }

    #[test]
    fn planned_transform_matches_reference(){
        for &size in &SIZES {
            let signal = test_signal(size);

            let mut fast = signal.clone();
            let mut slow = signal.clone();
            forward_dct_1d(&mut fast);
            reference::forward_dct_1d(&mut slow);

            for (fast, slow) in fast.iter().zip(&slow) {
                assert!((fast - slow).abs() < 1e-4, "forward size {}: {} vs {}", size, fast, slow);
            }

            inverse_dct_1d(&mut fast);
            reference::inverse_dct_1d(&mut slow);

            for ((fast, slow), original) in fast.iter().zip(&slow).zip(&signal) {
                assert!((fast - slow).abs() < 1e-4, "inverse size {}", size);
                assert!((fast - original).abs() < 1e-3, "round trip size {}", size);
            }
        }
    }

    #[test]
    fn two_dimensional_round_trip(){
        for &size in &SIZES {
            let original: Vec<f32> = (0 .. size * size).map(|index| ((index * 13) % 17) as f32).collect();
            let mut block = original.clone();

            forward_dct_2d(size, &mut block);
            inverse_dct_2d(size, &mut block);

            for (restored, original) in block.iter().zip(&original) {
                assert!((restored - original).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn resample_scale_relates_downsampled_coefficients(){
        let size = 16;
        let resampled_size = 4;
        let factor = size / resampled_size;

        // only frequencies the short signal can represent, higher ones would alias
        let mut signal = vec![0.0; size];
        signal[.. resampled_size].copy_from_slice(&[3.0, -2.0, 1.5, 0.75]);
        reference::inverse_dct_1d(&mut signal);

        let downsampled: Vec<f32> = signal.chunks_exact(factor)
            .map(|group| group.iter().sum::<f32>() / factor as f32)
            .collect();

        let mut long = signal.clone();
        let mut short = downsampled.clone();
        reference::forward_dct_1d(&mut long);
        reference::forward_dct_1d(&mut short);

        for index in 0 .. resampled_size {
            let expected = long[index] * resample_scale(index, size, resampled_size);
            assert!((short[index] - expected).abs() < 1e-3, "coefficient {}", index);
        }
    }
}
