//! Encode synthetic images and check that decoding restores them.

extern crate pik;
use pik::prelude::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;


/// Smooth gradients with a little noise, as 8 bit sRGB.
fn test_image(size: Vec2<usize>, noise: i32, seed: u64) -> CodecInOut {
    let mut random = StdRng::seed_from_u64(seed);
    let mut pixels = Vec::with_capacity(size.area() * 3);

    for y in 0 .. size.height() {
        for x in 0 .. size.width() {
            let base = [
                x * 255 / size.width(),
                y * 255 / size.height(),
                (x + y) * 127 / (size.width() + size.height()) + 64,
            ];

            for value in base {
                let disturbed = value as i32 + random.random_range(-noise ..= noise);
                pixels.push(disturbed.clamp(0, 255) as u8);
            }
        }
    }

    CodecInOut::from_srgb8(size, &pixels).unwrap()
}

/// Mean and maximum absolute difference of all samples.
fn errors(original: &Image3F, decoded: &Image3F) -> (f32, f32) {
    assert_eq!(original.size(), decoded.size());

    let differences: Vec<f32> = original.planes.iter().zip(&decoded.planes)
        .flat_map(|(original, decoded)| {
            original.samples().iter().zip(decoded.samples())
                .map(|(original, decoded)| (original - decoded).abs())
        })
        .collect();

    let mean = differences.iter().sum::<f32>() / differences.len() as f32;
    let max = differences.iter().copied().fold(0.0, f32::max);
    (mean, max)
}

fn round_trip(params: &CompressParams, image: &CodecInOut, pool: &WorkerPool) -> (Vec<u8>, CodecInOut) {
    let bytes = pixels_to_pik(params, image, pool, None).unwrap();
    let decoded = pik_to_pixels(&DecompressParams::default(), &bytes, pool, None).unwrap();
    (bytes, decoded)
}


#[test]
fn lossy_round_trip_is_close() {
    let pool = WorkerPool::new(0);

    for (index, &size) in [ Vec2(1, 1), Vec2(7, 13), Vec2(64, 64), Vec2(130, 70), Vec2(33, 200) ].iter().enumerate() {
        let image = test_image(size, 4, index as u64);
        let (bytes, decoded) = round_trip(&CompressParams::default(), &image, &pool);

        assert_eq!(decoded.size(), size);
        assert_eq!(decoded.original_bits_per_sample, Some(8));
        assert_eq!(decoded.encoded_size, bytes.len());

        let (mean, max) = errors(&image.image, &decoded.image);
        assert!(mean < 3.0, "mean error {} at size {:?}", mean, size);
        assert!(max < 40.0, "max error {} at size {:?}", max, size);
    }
}

#[test]
fn lossless_round_trip_is_exact() {
    let pool = WorkerPool::new(0);
    let image = test_image(Vec2(71, 40), 30, 7);

    for params in [ CompressParams::lossless(), CompressParams::progressive().with_lossless_mode() ] {
        let (_, decoded) = round_trip(&params, &image, &pool);
        assert_eq!(decoded.image, image.image);
    }
}

#[test]
fn lossy_progressive_round_trip_is_close() {
    let pool = WorkerPool::new(0);
    let image = test_image(Vec2(100, 90), 4, 3);

    let (_, decoded) = round_trip(&CompressParams::progressive(), &image, &pool);
    let (mean, max) = errors(&image.image, &decoded.image);
    assert!(mean < 3.0, "mean error {}", mean);
    assert!(max < 40.0, "max error {}", max);
}

#[test]
fn round_trip_without_predictions() {
    let pool = WorkerPool::sequential();
    let image = test_image(Vec2(48, 40), 4, 11);

    let params = CompressParams::default()
        .without_predictions()
        .with_gradient(Override::Off)
        .with_fixed_block_size();

    let (_, decoded) = round_trip(&params, &image, &pool);
    let (mean, _) = errors(&image.image, &decoded.image);
    assert!(mean < 3.0, "mean error {}", mean);
}

#[test]
fn parallel_processing_does_not_change_the_result() {
    let image = test_image(Vec2(150, 140), 6, 5);
    let params = CompressParams::progressive();

    let (sequential_bytes, sequential) = round_trip(&params, &image, &WorkerPool::sequential());
    let (parallel_bytes, parallel) = round_trip(&params, &image, &WorkerPool::new(4));

    assert_eq!(sequential_bytes, parallel_bytes);
    assert_eq!(sequential.image, parallel.image);
}

#[test]
fn larger_distances_produce_smaller_files() {
    let pool = WorkerPool::new(0);
    let image = test_image(Vec2(96, 96), 10, 13);

    let (fine, _) = round_trip(&CompressParams::default(), &image, &pool);
    let (coarse, decoded) = round_trip(&CompressParams::default().with_distance(4.0), &image, &pool);
    assert!(coarse.len() < fine.len(), "{} is not smaller than {}", coarse.len(), fine.len());

    let (mean, _) = errors(&image.image, &decoded.image);
    assert!(mean < 8.0, "mean error {}", mean);
}

#[test]
fn adaptive_reconstruction_is_signalled() {
    let pool = WorkerPool::new(0);
    let image = test_image(Vec2(64, 48), 6, 17);

    for (setting, expected) in [ (Override::On, Some(true)), (Override::Off, Some(false)), (Override::Default, None) ] {
        let params = CompressParams::default()
            .with_distance(2.0)
            .with_adaptive_reconstruction(setting)
            .with_comparator(Arc::new(SquaredErrorComparator));

        let mut info = PikInfo::default();
        let bytes = pixels_to_pik(&params, &image, &pool, Some(&mut info)).unwrap();
        assert_eq!(info.passes.len(), 1);

        if let Some(expected) = expected {
            assert_eq!(info.passes[0].adaptive_reconstruction, expected);
        }

        let mut decoded_info = PikInfo::default();
        let decoded = pik_to_pixels(&DecompressParams::default(), &bytes, &pool, Some(&mut decoded_info)).unwrap();
        assert_eq!(decoded_info, info);

        let (mean, _) = errors(&image.image, &decoded.image);
        assert!(mean < 5.0, "mean error {}", mean);
    }
}

#[test]
fn images_without_pixels_are_rejected() {
    let image = CodecInOut::new(Image3F::new(Vec2(0, 10)), Some(8));
    let result = pixels_to_pik(&CompressParams::default(), &image, &WorkerPool::sequential(), None);
    assert!(matches!(result, Err(Error::Invalid(_))));
}
