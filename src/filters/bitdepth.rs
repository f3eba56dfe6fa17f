//! Bit-depth reduction with 8x8 ordered (Bayer) dithering.

use crate::error::Result;
use crate::filters::{checked_samples, require_len};
use crate::image::FloatImage;
use crate::pool::ThreadPool;

pub const MIN_BITS: u32 = 1;
pub const MAX_BITS: u32 = 8;

const BAYER_8X8: [[u8; 8]; 8] = [
    [0, 48, 12, 60, 3, 51, 15, 63],
    [32, 16, 44, 28, 35, 19, 47, 31],
    [8, 56, 4, 52, 11, 59, 7, 55],
    [40, 24, 36, 20, 43, 27, 39, 23],
    [2, 50, 14, 62, 1, 49, 13, 61],
    [34, 18, 46, 30, 33, 17, 45, 29],
    [10, 58, 6, 54, 9, 57, 5, 53],
    [42, 26, 38, 22, 41, 25, 37, 21],
];

/// Dither threshold in `(0, 1)` for pixel `(x, y)`; depends only on `x mod 8, y mod 8`.
#[inline]
pub fn dither_threshold(x: usize, y: usize) -> f32 {
    (f32::from(BAYER_8X8[y & 7][x & 7]) + 0.5) / 64.0
}

/// Number of output levels for `bits`, after clamping to `1..=8`.
pub fn levels(bits: u32) -> u32 {
    1 << bits.clamp(MIN_BITS, MAX_BITS)
}

#[inline]
fn quantize_sample(value: f32, threshold: f32, levels: f32, max_level: f32) -> f32 {
    let scaled = value.clamp(0.0, 1.0) * levels;
    let level = (scaled + threshold - 0.5).floor().clamp(0.0, max_level);
    level / max_level
}

/// Quantizes `data` in place to `2^bits` evenly spaced levels in `[0, 1]`.
///
/// `data` holds `width * height * channels` interleaved samples; any channel
/// count works. `bits` outside `1..=8` is clamped.
pub fn quantize_bitdepth(
    pool: &ThreadPool,
    data: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    bits: u32,
) -> Result<()> {
    let samples = checked_samples(width, height, channels)?;
    require_len(data.len(), samples)?;

    let levels = levels(bits);
    let max_level = (levels - 1) as f32;
    let levels = levels as f32;
    let row_len = width * channels;

    pool.parallel_chunks_mut(&mut data[..samples], row_len, |y, row| {
        for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
            let threshold = dither_threshold(x, y);
            for sample in pixel {
                *sample = quantize_sample(*sample, threshold, levels, max_level);
            }
        }
    });
    Ok(())
}

/// In-place [`quantize_bitdepth`] over a [`FloatImage`].
pub fn quantize_image(pool: &ThreadPool, image: &mut FloatImage, bits: u32) -> Result<()> {
    let (width, height, channels) = (image.width(), image.height(), image.channels());
    quantize_bitdepth(pool, image.pixels_mut(), width, height, channels, bits)
}
