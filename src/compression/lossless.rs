
//! Exact coding of floating point samples.
//!
//! Each sample is stored as the exclusive or of its bit pattern with the bit pattern
//! of the reconstruction so far. Where the reconstruction is close, most high bits cancel.
//! The words are split into byte planes, delta coded and compressed with zlib.

use lebe::prelude::*;

use crate::compression::optimize_bytes::*;
use crate::compression::{deflate, inflate, ByteVec, Bytes};
use crate::error::{Error, Result};
use crate::image::{Image3F, Plane};
use crate::math::Vec2;

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<u32>();


/// Compress the image exactly. The decoder must use the same reference.
pub fn encode(image: &Image3F, reference: Option<&Image3F>) -> Result<ByteVec> {
    let size = image.size();
    let mut words: Vec<u32> = Vec::with_capacity(size.area() * 3);

    for channel in 0 .. 3 {
        let samples = image.plane(channel).samples();

        match reference {
            Some(reference) => words.extend(
                samples.iter().zip(reference.plane(channel).samples())
                    .map(|(sample, reference)| sample.to_bits() ^ reference.to_bits())
            ),

            None => words.extend(samples.iter().map(|sample| sample.to_bits())),
        }
    }

    let mut bytes = Vec::with_capacity(words.len() * BYTES_PER_SAMPLE);
    bytes.write_as_little_endian(words.as_slice())?;

    separate_bytes_fragments(&mut bytes, BYTES_PER_SAMPLE);
    samples_to_differences(&mut bytes);

    Ok(deflate(&bytes))
}

/// Reconstruct the exact image.
pub fn decode(compressed: Bytes<'_>, size: Vec2<usize>, reference: Option<&Image3F>) -> Result<Image3F> {
    if let Some(reference) = reference {
        if reference.size() != size { return Err(Error::invalid("reference image size mismatch")); }
    }

    let sample_count = size.area() * 3;
    let mut bytes = inflate(compressed, sample_count * BYTES_PER_SAMPLE)?;

    differences_to_samples(&mut bytes);
    interleave_byte_blocks(&mut bytes, BYTES_PER_SAMPLE);

    let mut words = vec![0_u32; sample_count];
    let mut read: &[u8] = &bytes;
    read.read_from_little_endian_into(words.as_mut_slice())?;

    let plane = |channel: usize| {
        let words = &words[channel * size.area() .. (channel + 1) * size.area()];

        let samples: Vec<f32> = match reference {
            Some(reference) => words.iter().zip(reference.plane(channel).samples())
                .map(|(&word, reference)| f32::from_bits(word ^ reference.to_bits()))
                .collect(),

            None => words.iter().map(|&word| f32::from_bits(word)).collect(),
        };

        Plane::from_samples(size, samples)
    };

    Ok(Image3F::from_planes([plane(0), plane(1), plane(2)]))
}


#[cfg(test)]
mod test {
    use super::*;

    fn noisy_image(size: Vec2<usize>, seed: u32) -> Image3F {
        let plane = |channel: u32| Plane::from_fn(size, |position| {
            let hash = (position.x() as u32).wrapping_mul(2_654_435_761) ^ (position.y() as u32 * 97) ^ (seed + channel);
            (hash % 25_500) as f32 / 100.0 - 0.37
        });

        Image3F::from_planes([plane(0), plane(1), plane(2)])
    }

    #[test]
    fn exact_without_reference(){
        let image = noisy_image(Vec2(13, 7), 1);
        let compressed = encode(&image, None).unwrap();
        assert_eq!(decode(&compressed, image.size(), None).unwrap(), image);
    }

    #[test]
    fn exact_with_reference(){
        let image = noisy_image(Vec2(9, 11), 2);
        let mut reference = noisy_image(Vec2(9, 11), 2);
        for sample in reference.plane_mut(1).samples_mut() { *sample += 0.25; }

        let compressed = encode(&image, Some(&reference)).unwrap();
        let decoded = decode(&compressed, image.size(), Some(&reference)).unwrap();

        for (decoded, original) in decoded.planes.iter().zip(&image.planes) {
            for (decoded, original) in decoded.samples().iter().zip(original.samples()) {
                assert_eq!(decoded.to_bits(), original.to_bits());
            }
        }
    }

    #[test]
    fn wrong_size_fails(){
        let image = noisy_image(Vec2(4, 4), 3);
        let compressed = encode(&image, None).unwrap();
        assert!(decode(&compressed, Vec2(4, 5), None).is_err());
    }
}
