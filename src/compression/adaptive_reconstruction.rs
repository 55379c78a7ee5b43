
//! Post filter for lossy passes.
//! Pulls every sample towards the mean of its neighbourhood,
//! but never further than the noise the quantizer could have introduced.

use crate::block::parallel::WorkerPool;
use crate::block::{BLOCK_DIM, TILE_DIM_IN_BLOCKS};
use crate::compression::prediction::smooth_sample;
use crate::compression::quantizer::Quantizer;
use crate::error::UnitResult;
use crate::image::{Image3F, PlaneF};


/// Fraction of the limited difference that is applied.
const STRENGTH: f32 = 0.5;

/// Rows filtered by one task.
const ROWS_PER_TASK: usize = BLOCK_DIM * TILE_DIM_IN_BLOCKS;


/// Filter a reconstructed image in the working color space, in place.
/// Every sample moves by at most half of the noise amplitude of its channel.
pub fn apply(image: &mut Image3F, quantizer: Quantizer, pool: &WorkerPool) -> UnitResult {
    for channel in 0 .. 3 {
        let limit = quantizer.noise_amplitude(channel);
        let source = image.plane(channel).clone();
        let task_count = (source.height() + ROWS_PER_TASK - 1) / ROWS_PER_TASK;

        let bands = pool.run_parallel_for(task_count, |task| {
            let rows = task * ROWS_PER_TASK .. ((task + 1) * ROWS_PER_TASK).min(source.height());
            Ok(rows.flat_map(|y| filter_row(&source, y, limit)).collect::<Vec<f32>>())
        })?;

        let target = image.plane_mut(channel).samples_mut();
        for (task, band) in bands.into_iter().enumerate() {
            let start = task * ROWS_PER_TASK * source.width();
            target[start .. start + band.len()].copy_from_slice(&band);
        }
    }

    Ok(())
}

fn filter_row(source: &PlaneF, y: usize, limit: f32) -> impl Iterator<Item = f32> + '_ {
    (0 .. source.width()).map(move |x| {
        let sample = source.get(x, y);
        let difference = (smooth_sample(source, x, y) - sample).max(-limit).min(limit);
        sample + STRENGTH * difference
    })
}
