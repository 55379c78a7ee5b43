//! Check the pass structure of progressive files and the robustness of the container.

extern crate pik;
use pik::prelude::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;


fn test_image(size: Vec2<usize>, seed: u64) -> CodecInOut {
    let mut random = StdRng::seed_from_u64(seed);

    let pixels: Vec<u8> = (0 .. size.area() * 3)
        .map(|index| {
            let pixel = index / 3;
            let (x, y) = (pixel % size.width(), pixel / size.width());
            let smooth = (x * 3 + y * 2 + (index % 3) * 40) % 200;
            (smooth as i32 + random.random_range(0 .. 20)) as u8
        })
        .collect();

    CodecInOut::from_srgb8(size, &pixels).unwrap()
}

fn encode(params: &CompressParams, image: &CodecInOut) -> (Vec<u8>, PikInfo) {
    let mut info = PikInfo::default();
    let bytes = pixels_to_pik(params, image, &WorkerPool::new(0), Some(&mut info)).unwrap();
    (bytes, info)
}

fn decode(params: &DecompressParams, bytes: &[u8]) -> pik::error::Result<(CodecInOut, PikInfo)> {
    let mut info = PikInfo::default();
    let image = pik_to_pixels(params, bytes, &WorkerPool::new(0), Some(&mut info))?;
    Ok((image, info))
}

/// Scope, last flag and lossless flag of every pass.
fn structure(info: &PikInfo) -> Vec<(PassScope, bool, bool)> {
    info.passes.iter()
        .map(|pass| (pass.descriptor.scope, pass.descriptor.is_last, pass.lossless))
        .collect()
}


#[test]
fn pass_structure_follows_the_parameters() {
    let image = test_image(Vec2(72, 56), 1);
    let saliency: Arc<dyn SaliencyExtractor> = Arc::new(DetailSaliency::default());

    let cases = [
        (CompressParams::default(), vec![
            (PassScope::Full, true, false),
        ]),

        (CompressParams::lossless(), vec![
            (PassScope::Full, true, true),
        ]),

        (CompressParams::progressive(), vec![
            (PassScope::LfOnly, false, false),
            (PassScope::HfOnly, true, false),
        ]),

        (CompressParams::progressive().with_saliency(saliency.clone(), 0.5), vec![
            (PassScope::LfOnly, false, false),
            (PassScope::SalientHfOnly, false, false),
            (PassScope::NonSalientHfOnly, true, false),
        ]),

        (CompressParams::progressive().with_saliency(saliency, 0.5).with_lossless_mode(), vec![
            (PassScope::LfOnly, false, false),
            (PassScope::SalientHfOnly, false, false),
            (PassScope::NonSalientHfOnly, false, false),
            (PassScope::Full, true, true),
        ]),
    ];

    for (params, expected) in cases {
        let (bytes, info) = encode(&params, &image);
        assert_eq!(structure(&info), expected);
        assert_eq!(info.total_bytes(), bytes.len());

        let (decoded, decoded_info) = decode(&DecompressParams::default(), &bytes).unwrap();
        assert_eq!(decoded_info, info);
        assert_eq!(decoded.size(), image.size());
    }
}

#[test]
fn only_the_final_lossy_pass_is_filtered() {
    let image = test_image(Vec2(72, 56), 1);
    let saliency: Arc<dyn SaliencyExtractor> = Arc::new(DetailSaliency::default());

    let cases = [
        (CompressParams::progressive(), vec![ false, true ]),
        (CompressParams::progressive().with_saliency(saliency.clone(), 0.5), vec![ false, false, true ]),
        (CompressParams::progressive().with_saliency(saliency, 0.5).with_lossless_mode(), vec![ false, false, true, false ]),
    ];

    for (params, expected) in cases {
        let params = params.with_adaptive_reconstruction(Override::On);
        let (bytes, info) = encode(&params, &image);

        let filtered: Vec<bool> = info.passes.iter().map(|pass| pass.adaptive_reconstruction).collect();
        assert_eq!(filtered, expected);

        let (_, decoded_info) = decode(&DecompressParams::default(), &bytes).unwrap();
        assert_eq!(decoded_info, info);
    }
}

#[test]
fn progressive_passes_refine_the_image() {
    let image = test_image(Vec2(64, 64), 2);
    let (bytes, info) = encode(&CompressParams::progressive(), &image);

    assert_eq!(structure(&info), vec![ (PassScope::LfOnly, false, false), (PassScope::HfOnly, true, false) ]);
    assert!(!info.passes[0].adaptive_reconstruction);

    let (preview, preview_info) = decode(&DecompressParams::default().with_max_passes(1), &bytes).unwrap();
    assert_eq!(preview_info.passes.len(), 1);

    let (full, _) = decode(&DecompressParams::default(), &bytes).unwrap();

    let squared_error = |decoded: &Image3F| -> f64 {
        decoded.planes.iter().zip(&image.image.planes)
            .flat_map(|(decoded, original)| decoded.samples().iter().zip(original.samples()))
            .map(|(decoded, original)| ((decoded - original) as f64).powi(2))
            .sum()
    };

    assert!(squared_error(&full.image) < squared_error(&preview.image));
}

#[test]
fn lossless_base_is_refined() {
    let size = Vec2(40, 24);
    let image = test_image(size, 3);
    let base = test_image(size, 4);

    let directory = std::env::temp_dir();
    let base_path = directory.join("pik_lossless_base.png");
    let wrong_size_path = directory.join("pik_lossless_base_wrong_size.png");

    image::RgbImage::from_raw(size.width() as u32, size.height() as u32, base.to_srgb8()).unwrap()
        .save(&base_path).unwrap();

    image::RgbImage::new(3, 3).save(&wrong_size_path).unwrap();

    let (bytes, info) = encode(&CompressParams::default().with_lossless_base(&base_path), &image);
    assert_eq!(structure(&info), vec![ (PassScope::Full, false, true), (PassScope::Full, true, false) ]);
    assert!(!info.passes[0].adaptive_reconstruction);

    let (decoded, _) = decode(&DecompressParams::default(), &bytes).unwrap();
    assert_eq!(decoded.size(), size);

    let wrong_size = pixels_to_pik(
        &CompressParams::default().with_lossless_base(&wrong_size_path),
        &image, &WorkerPool::sequential(), None
    );

    assert!(matches!(wrong_size, Err(Error::Invalid(_))));

    let missing = pixels_to_pik(
        &CompressParams::default().with_lossless_base(directory.join("pik_no_such_file.png")),
        &image, &WorkerPool::sequential(), None
    );

    assert!(missing.is_err());
}

#[test]
fn truncated_files_are_rejected() {
    let image = test_image(Vec2(20, 12), 5);
    let (bytes, _) = encode(&CompressParams::progressive().with_lossless_mode(), &image);

    for length in 0 .. bytes.len() {
        assert!(decode(&DecompressParams::default(), &bytes[.. length]).is_err(), "length {} was accepted", length);
    }
}

#[test]
fn trailing_bytes_are_rejected_unless_lenient() {
    let image = test_image(Vec2(16, 16), 6);
    let (mut bytes, _) = encode(&CompressParams::default(), &image);
    let (expected, _) = decode(&DecompressParams::default(), &bytes).unwrap();

    bytes.push(0);

    let strict = decode(&DecompressParams::default(), &bytes);
    assert!(matches!(strict, Err(Error::Invalid(_))));

    let (lenient, _) = decode(&DecompressParams::default().lenient(), &bytes).unwrap();
    assert_eq!(lenient.image, expected.image);
}

#[test]
fn preview_is_skipped_by_the_decoder() {
    let size = Vec2(50, 30);
    let image = test_image(size, 7);
    let (mut bytes, info) = encode(&CompressParams::default().with_preview(), &image);
    assert!(info.preview_bytes > 0);

    let preview = read_preview(&DecompressParams::default(), &bytes).unwrap().unwrap();
    assert_eq!(preview.size(), Vec2(7, 4));

    let (expected, _) = decode(&DecompressParams::default(), &bytes).unwrap();

    for byte in &mut bytes[info.header_bytes .. info.header_bytes + info.preview_bytes] {
        *byte = 0x5a;
    }

    let (decoded, _) = decode(&DecompressParams::default(), &bytes).unwrap();
    assert_eq!(decoded.image, expected.image);
    assert!(read_preview(&DecompressParams::default(), &bytes).is_err());

    let (without_preview, _) = encode(&CompressParams::default(), &image);
    assert_eq!(read_preview(&DecompressParams::default(), &without_preview).unwrap(), None);
}

#[test]
fn oversized_images_are_refused() {
    let image = test_image(Vec2(30, 30), 8);
    let (bytes, _) = encode(&CompressParams::default(), &image);

    assert!(decode(&DecompressParams::default().with_max_pixels(30 * 30), &bytes).is_ok());
    assert!(matches!(decode(&DecompressParams::default().with_max_pixels(30 * 29), &bytes), Err(Error::Invalid(_))));
}

#[test]
fn sizes_beyond_the_file_length_are_refused() {
    let header = meta::FileHeader::new(Vec2(1 << 30, 1 << 30), 8);
    let (extension_bits, _) = meta::can_encode(&header).unwrap();

    let mut writer = pik::io::BitWriter::new();
    meta::write_file_header(&header, extension_bits, &mut writer).unwrap();
    writer.zero_pad_to_byte();

    let mut bytes = writer.into_bytes();
    bytes.extend_from_slice(&[ 0; 16 ]);

    assert!(matches!(decode(&DecompressParams::default(), &bytes), Err(Error::Invalid(_))));
    assert!(matches!(decode(&DecompressParams::default().lenient(), &bytes), Err(Error::Invalid(_))));
}
