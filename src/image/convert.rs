
//! Conversion between 8 bit sRGB samples and linear samples in the range `0..=255`.
//! The lookup tables are built once, on first use.

use std::sync::OnceLock;

/// The number of entries in the linear to sRGB table, one per sixteenth of a linear unit.
pub const LINEAR_TABLE_SIZE: usize = 4096;


/// The exact sRGB transfer function, for samples in `0..=255`.
pub fn srgb_to_linear(encoded: f32) -> f32 {
    let normalized = encoded / 255.0;

    let linear = if normalized <= 0.04045 { normalized / 12.92 }
        else { ((normalized + 0.055) / 1.055).powf(2.4) };

    linear * 255.0
}

/// The exact inverse sRGB transfer function, for samples in `0..=255`.
pub fn linear_to_srgb(linear: f32) -> f32 {
    let normalized = (linear / 255.0).max(0.0).min(1.0);

    let encoded = if normalized <= 0.003_130_8 { normalized * 12.92 }
        else { 1.055 * normalized.powf(1.0 / 2.4) - 0.055 };

    encoded * 255.0
}

/// Linear value of every 8 bit sRGB sample.
pub fn srgb8_to_linear_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = [0.0; 256];
        for (index, value) in table.iter_mut().enumerate() {
            *value = srgb_to_linear(index as f32);
        }

        table
    })
}

/// 8 bit sRGB sample for linear values in steps of 1/16, clamped to the table.
pub fn linear_to_srgb8_table() -> &'static [u8; LINEAR_TABLE_SIZE] {
    static TABLE: OnceLock<[u8; LINEAR_TABLE_SIZE]> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = [0; LINEAR_TABLE_SIZE];
        for (index, value) in table.iter_mut().enumerate() {
            *value = round_to_u8(linear_to_srgb(index as f32 / 16.0));
        }

        table
    })
}

/// Exact conversion of a linear sample to 8 bit sRGB.
pub fn srgb8_from_linear(linear: f32) -> u8 {
    round_to_u8(linear_to_srgb(linear))
}

/// Fast table based conversion of a linear sample to 8 bit sRGB,
/// off by at most one from `srgb8_from_linear`.
pub fn srgb8_from_linear_approximate(linear: f32) -> u8 {
    let index = (linear * 16.0).round().max(0.0).min((LINEAR_TABLE_SIZE - 1) as f32);
    linear_to_srgb8_table()[index as usize]
}

fn round_to_u8(value: f32) -> u8 {
    value.round().max(0.0).min(255.0) as u8
}
