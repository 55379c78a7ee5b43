
//! Contains the transforms, predictions and coders that turn image samples into pass payloads.

pub mod adaptive_reconstruction;
pub mod csc;
pub mod dct;
pub mod entropy;
pub mod gradient;
pub mod lossless;
pub mod prediction;
pub mod quantizer;


/// A byte vector.
pub type ByteVec = Vec<u8>;

/// A byte slice.
pub type Bytes<'s> = &'s [u8];


/// No zlib stream decompresses to more than this many bytes per compressed byte.
pub(crate) const MAX_INFLATE_RATIO: usize = 1032;


/// Compress bytes with zlib.
pub(crate) fn deflate(bytes: Bytes<'_>) -> ByteVec {
    miniz_oxide::deflate::compress_to_vec_zlib(bytes, 6)
}

/// Decompress zlib bytes, failing unless exactly `expected_byte_size` bytes come out.
pub(crate) fn inflate(compressed: Bytes<'_>, expected_byte_size: usize) -> crate::error::Result<ByteVec> {
    // one more byte than expected reveals longer streams
    let decompressed = inflate_at_most(compressed, expected_byte_size.saturating_add(1))?;

    if decompressed.len() != expected_byte_size {
        return Err(crate::error::Error::invalid("decompressed data size mismatch"));
    }

    Ok(decompressed)
}

/// Decompress zlib bytes, failing as soon as more than `max_byte_size` bytes come out.
pub(crate) fn inflate_at_most(compressed: Bytes<'_>, max_byte_size: usize) -> crate::error::Result<ByteVec> {
    let options = zune_inflate::DeflateOptions::default()
        .set_limit(max_byte_size)
        .set_size_hint(max_byte_size.min(compressed.len().saturating_mul(4)));

    zune_inflate::DeflateDecoder::new_with_options(compressed, options)
        .decode_zlib()
        .map_err(|_| crate::error::Error::invalid("zlib-compressed data malformed"))
}


/// Reorder and delta code bytes so that zlib finds more repetitions.
pub(crate) mod optimize_bytes {

    /// Integrate over all differences to the previous value in order to reconstruct sample values.
    pub fn differences_to_samples(buffer: &mut [u8]) {
        for index in 1 .. buffer.len() {
            buffer[index] = buffer[index - 1].wrapping_add(buffer[index]).wrapping_sub(128);
        }
    }

    /// Derive over all values in order to produce differences to the previous value.
    pub fn samples_to_differences(buffer: &mut [u8]) {
        for index in (1 .. buffer.len()).rev() {
            buffer[index] = buffer[index].wrapping_sub(buffer[index - 1]).wrapping_add(128);
        }
    }

    /// Group the bytes by their index inside each `fragment_size` sized sample,
    /// such that all first bytes come first, then all second bytes, and so on.
    /// The length must be a multiple of the fragment size.
    pub fn separate_bytes_fragments(source: &mut [u8], fragment_size: usize) {
        debug_assert_eq!(source.len() % fragment_size, 0, "length is not a multiple of the fragment size");

        let sample_count = source.len() / fragment_size;
        let mut separated = vec![0_u8; source.len()];

        for (sample_index, sample) in source.chunks_exact(fragment_size).enumerate() {
            for (byte_index, &byte) in sample.iter().enumerate() {
                separated[byte_index * sample_count + sample_index] = byte;
            }
        }

        source.copy_from_slice(&separated);
    }

    /// Inverse of `separate_bytes_fragments`.
    pub fn interleave_byte_blocks(separated: &mut [u8], fragment_size: usize) {
        debug_assert_eq!(separated.len() % fragment_size, 0, "length is not a multiple of the fragment size");

        let sample_count = separated.len() / fragment_size;
        let mut interleaved = vec![0_u8; separated.len()];

        for (sample_index, sample) in interleaved.chunks_exact_mut(fragment_size).enumerate() {
            for (byte_index, byte) in sample.iter_mut().enumerate() {
                *byte = separated[byte_index * sample_count + sample_index];
            }
        }

        separated.copy_from_slice(&interleaved);
    }


}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zlib_round_trip(){
        let bytes: ByteVec = (0 .. 1000_u32).map(|index| (index % 7) as u8).collect();
        let compressed = deflate(&bytes);

        assert_eq!(inflate(&compressed, bytes.len()).unwrap(), bytes);
        assert!(inflate(&compressed, bytes.len() + 1).is_err());
    }

    #[test]
    fn inflating_stops_at_the_limit(){
        let zeroes = deflate(&vec![ 0_u8; 1 << 20 ]);
        assert!(zeroes.len() < 4096);

        assert!(inflate(&zeroes, 1000).is_err());
        assert!(inflate_at_most(&zeroes, 1 << 19).is_err());
        assert_eq!(inflate_at_most(&zeroes, 1 << 21).unwrap().len(), 1 << 20);
    }
}
