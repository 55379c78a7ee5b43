
//! The header preceding the payload of each pass.

use bit_field::BitField;

use crate::compression::csc::ColorCorrelation;
use crate::compression::{ByteVec, Bytes};
use crate::error::{usize_to_u32, Error, Result, UnitResult};
use crate::io::{BitReader, BitWriter};
use crate::meta::fields::{self, Fields, U32Coder, U32Distribution, Visitor};


/// Which coefficients and which part of the image a pass contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PassScope {

    /// All coefficients of the whole image.
    #[default]
    Full,

    /// Only DC and low frequency coefficients.
    LfOnly,

    /// Only high frequency coefficients.
    HfOnly,

    /// Only high frequency coefficients of the salient blocks.
    SalientHfOnly,

    /// Only high frequency coefficients of the blocks that are not salient.
    NonSalientHfOnly,
}

impl PassScope {

    /// The number stored in the bitstream.
    pub fn code(self) -> u32 {
        match self {
            PassScope::Full => 0,
            PassScope::LfOnly => 1,
            PassScope::HfOnly => 2,
            PassScope::SalientHfOnly => 3,
            PassScope::NonSalientHfOnly => 4,
        }
    }

    /// The scope stored in the bitstream, if the number is defined.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => PassScope::Full,
            1 => PassScope::LfOnly,
            2 => PassScope::HfOnly,
            3 => PassScope::SalientHfOnly,
            4 => PassScope::NonSalientHfOnly,
            _ => return None,
        })
    }

    /// Whether the pass contains the DC image.
    pub fn codes_dc(self) -> bool {
        matches!(self, PassScope::Full | PassScope::LfOnly)
    }

    /// Whether the pass contains low frequency coefficients.
    pub fn codes_lf(self) -> bool {
        self.codes_dc()
    }

    /// Whether the pass contains high frequency coefficients.
    pub fn codes_hf(self) -> bool {
        self != PassScope::LfOnly
    }

    /// Whether only some blocks are coded, as selected by the saliency map.
    pub fn is_saliency_split(self) -> bool {
        matches!(self, PassScope::SalientHfOnly | PassScope::NonSalientHfOnly)
    }
}


/// Describes how the payload of a pass is decoded.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PassHeader {

    /// Whether this is the final pass of the file.
    pub is_last: bool,

    /// Which coefficients the pass contains.
    pub scope: PassScope,

    /// Whether the payload contains exact samples instead of coefficients.
    pub lossless: bool,

    /// Whether the decoder applies the adaptive reconstruction filter.
    pub adaptive_reconstruction: bool,

    /// Whether the DC is coded against the gradient predictor.
    pub gradient: bool,

    /// Whether low frequency coefficients are predicted from the DC.
    pub predict_lf: bool,

    /// Whether high frequency coefficients are predicted from the low frequencies.
    pub predict_hf: bool,

    /// The scale of all quantization steps.
    pub quantizer_scale: f32,

    /// How chroma DC is predicted from luma DC.
    pub color_correlation: ColorCorrelation,

    /// The number of payload bytes following the header.
    pub payload_size: usize,
}

mod flags {
    pub const ADAPTIVE_RECONSTRUCTION: usize = 0;
    pub const GRADIENT: usize = 1;
    pub const PREDICT_LF: usize = 2;
    pub const PREDICT_HF: usize = 3;
    pub const COLOR_CORRELATION: usize = 4;
    pub const BITS: usize = 5;
}

const SCOPE_BITS: usize = 3;

const PAYLOAD_SIZE_CODER: U32Coder = U32Coder([
    U32Distribution::Bits(12), U32Distribution::Bits(16),
    U32Distribution::Bits(20), U32Distribution::Bits(32),
]);

fn visit_i8(visitor: &mut impl Visitor, value: &mut i8) -> UnitResult {
    let mut bits = *value as u8 as u32;
    visitor.bits(8, &mut bits)?;
    *value = bits as u8 as i8;
    Ok(())
}

impl Fields for PassHeader {
    fn visit_fields(&mut self, visitor: &mut impl Visitor) -> UnitResult {
        visitor.bool(&mut self.is_last)?;

        let mut scope = self.scope.code();
        visitor.bits(SCOPE_BITS, &mut scope)?;
        self.scope = PassScope::from_code(scope).ok_or_else(|| Error::invalid("undefined pass scope"))?;

        visitor.bool(&mut self.lossless)?;

        if !self.lossless {
            let mut flags = 0_u32;
            flags.set_bit(flags::ADAPTIVE_RECONSTRUCTION, self.adaptive_reconstruction);
            flags.set_bit(flags::GRADIENT, self.gradient);
            flags.set_bit(flags::PREDICT_LF, self.predict_lf);
            flags.set_bit(flags::PREDICT_HF, self.predict_hf);
            flags.set_bit(flags::COLOR_CORRELATION, self.color_correlation != ColorCorrelation::NONE);
            visitor.bits(flags::BITS, &mut flags)?;

            self.adaptive_reconstruction = flags.get_bit(flags::ADAPTIVE_RECONSTRUCTION);
            self.gradient = flags.get_bit(flags::GRADIENT);
            self.predict_lf = flags.get_bit(flags::PREDICT_LF);
            self.predict_hf = flags.get_bit(flags::PREDICT_HF);

            visitor.f16(&mut self.quantizer_scale)?;
            if self.quantizer_scale <= 0.0 {
                return Err(Error::invalid("quantizer scale not positive"));
            }

            if flags.get_bit(flags::COLOR_CORRELATION) {
                visit_i8(visitor, &mut self.color_correlation.luma_to_cb)?;
                visit_i8(visitor, &mut self.color_correlation.luma_to_cr)?;
            }
            else {
                self.color_correlation = ColorCorrelation::NONE;
            }
        }

        let mut payload_size = usize_to_u32(self.payload_size, "pass payload too large")?;
        visitor.u32(&PAYLOAD_SIZE_CODER, &mut payload_size)?;
        self.payload_size = payload_size as usize;

        // no extensions are defined yet
        let mut extensions = 0;
        visitor.begin_extensions(&mut extensions)?;
        visitor.end_extensions()
    }
}


/// Frame a payload with its header, padded to whole bytes.
/// Sets the payload size of the header.
pub fn write_pass(header: &PassHeader, payload: Bytes<'_>) -> Result<ByteVec> {
    let mut header = PassHeader { payload_size: payload.len(), .. *header };
    let (extension_bits, header_bits) = fields::count_bits(&mut header)?;

    let mut writer = BitWriter::with_capacity_bits(header_bits + 7 + payload.len() * 8);
    fields::write_fields(&mut header, extension_bits, &mut writer)?;
    debug_assert_eq!(writer.bit_position(), header_bits, "pass header size mismatch");

    writer.zero_pad_to_byte();
    writer.write_bytes(payload);
    Ok(writer.into_bytes())
}

/// Read a pass header and the payload that follows it.
pub fn read_pass<'b>(reader: &mut BitReader<'b>) -> Result<(PassHeader, Bytes<'b>)> {
    let header: PassHeader = fields::read_fields(reader)?;
    reader.jump_to_byte_boundary();

    let payload = reader.read_bytes(header.payload_size)?;
    Ok((header, payload))
}
