/*
    8x8 block transform attenuator.

    each tile is taken through an orthonormal 2-d dct-ii, every non-dc
    coefficient is quantized against a jpeg style step table, then the tile is
    transformed back. small high frequency coefficients collapse to zero, the dc
    term (tile brightness) is never touched.
*/

use std::f32::consts::PI;
use std::sync::LazyLock;

use crate::error::{BufferIssue, Result};
use crate::filters::boundary::clamp_index;
use crate::filters::{checked_samples, require_len};
use crate::image::FloatImage;
use crate::pool::ThreadPool;

pub const BLOCK: usize = 8;
const BLOCK_AREA: usize = BLOCK * BLOCK;

/// Quality at and above which quantization is skipped.
pub const LOSSLESS_QUALITY: i32 = 100;

// jpeg annex k luminance table, quality 50
const BASE_STEPS: [u16; BLOCK_AREA] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

// sqrt(1/8) for the dc row, sqrt(2/8) elsewhere
const ALPHA: [f32; BLOCK] = [0.353_553_38, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5];

// cos[u][x] = cos(pi/8 * u * (x + 0.5))
static COS: LazyLock<[[f32; BLOCK]; BLOCK]> = LazyLock::new(|| {
    let mut table = [[0.0f32; BLOCK]; BLOCK];
    for (u, row) in table.iter_mut().enumerate() {
        for (x, value) in row.iter_mut().enumerate() {
            *value = (PI / 8.0 * u as f32 * (x as f32 + 0.5)).cos();
        }
    }
    table
});

/// Per-coefficient quantization steps for `quality` (clamped to `1..=100`).
///
/// Quality 100 yields all ones. The DC step is always 1.
pub fn quant_table(quality: i32) -> [f32; BLOCK_AREA] {
    let q = quality.clamp(1, LOSSLESS_QUALITY);
    if q >= LOSSLESS_QUALITY {
        return [1.0; BLOCK_AREA];
    }

    let scaled = if q < 50 { 5000 / q } else { 200 - q * 2 };
    let mut table = [0.0f32; BLOCK_AREA];
    for (step, &base) in table.iter_mut().zip(BASE_STEPS.iter()) {
        let value = (i32::from(base) * scaled + 50) / 100;
        *step = value.clamp(1, 255) as f32;
    }
    table[0] = 1.0;
    table
}

fn fdct_1d(input: &[f32; BLOCK], output: &mut [f32; BLOCK]) {
    let cos = &*COS;
    for u in 0..BLOCK {
        let sum: f32 = input.iter().zip(cos[u].iter()).map(|(v, c)| v * c).sum();
        output[u] = sum * ALPHA[u];
    }
}

fn idct_1d(input: &[f32; BLOCK], output: &mut [f32; BLOCK]) {
    let cos = &*COS;
    for x in 0..BLOCK {
        let mut sum = 0.0;
        for u in 0..BLOCK {
            sum += ALPHA[u] * input[u] * cos[u][x];
        }
        output[x] = sum;
    }
}

/// Forward 2-D transform in place, rows then columns.
pub fn forward_dct(block: &mut [f32; BLOCK_AREA]) {
    let mut line = [0.0f32; BLOCK];
    let mut out = [0.0f32; BLOCK];

    for y in 0..BLOCK {
        line.copy_from_slice(&block[y * BLOCK..(y + 1) * BLOCK]);
        fdct_1d(&line, &mut out);
        block[y * BLOCK..(y + 1) * BLOCK].copy_from_slice(&out);
    }
    for x in 0..BLOCK {
        for y in 0..BLOCK {
            line[y] = block[y * BLOCK + x];
        }
        fdct_1d(&line, &mut out);
        for y in 0..BLOCK {
            block[y * BLOCK + x] = out[y];
        }
    }
}

/// Inverse of [`forward_dct`], columns then rows.
pub fn inverse_dct(block: &mut [f32; BLOCK_AREA]) {
    let mut line = [0.0f32; BLOCK];
    let mut out = [0.0f32; BLOCK];

    for x in 0..BLOCK {
        for y in 0..BLOCK {
            line[y] = block[y * BLOCK + x];
        }
        idct_1d(&line, &mut out);
        for y in 0..BLOCK {
            block[y * BLOCK + x] = out[y];
        }
    }
    for y in 0..BLOCK {
        line.copy_from_slice(&block[y * BLOCK..(y + 1) * BLOCK]);
        idct_1d(&line, &mut out);
        block[y * BLOCK..(y + 1) * BLOCK].copy_from_slice(&out);
    }
}

fn quantize_block(block: &mut [f32; BLOCK_AREA], steps: &[f32; BLOCK_AREA]) {
    for (coefficient, &step) in block.iter_mut().zip(steps.iter()).skip(1) {
        *coefficient = (*coefficient / step).round_ties_even() * step;
    }
}

fn attenuate_into(
    pool: &ThreadPool,
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    quality: i32,
) {
    let steps = quant_table(quality);
    let quantize = quality < LOSSLESS_QUALITY;
    let row_len = width * channels;
    let tiles_x = width.div_ceil(BLOCK);

    // one chunk per band of 8 rows, each band owns its output rows outright
    pool.parallel_chunks_mut(&mut dst[..row_len * height], BLOCK * row_len, |band, out| {
        let base_y = band * BLOCK;
        let rows = out.len() / row_len;
        let mut block = [0.0f32; BLOCK_AREA];

        for tile_x in 0..tiles_x {
            let base_x = tile_x * BLOCK;
            for c in 0..channels {
                for yy in 0..BLOCK {
                    let sy = clamp_index(base_y + yy, height);
                    for xx in 0..BLOCK {
                        let sx = clamp_index(base_x + xx, width);
                        block[yy * BLOCK + xx] = src[(sy * width + sx) * channels + c];
                    }
                }

                forward_dct(&mut block);
                if quantize {
                    quantize_block(&mut block, &steps);
                }
                inverse_dct(&mut block);

                for yy in 0..rows {
                    for xx in 0..BLOCK.min(width - base_x) {
                        out[yy * row_len + (base_x + xx) * channels + c] = block[yy * BLOCK + xx];
                    }
                }
            }
        }
    });
}

/// Attenuates high-frequency content of `input` at `quality` (1 to 100).
pub fn hf_attenuate(pool: &ThreadPool, input: &FloatImage, quality: i32) -> Result<FloatImage> {
    if input.is_empty() {
        return Err(BufferIssue::ZeroDimension.into());
    }
    let mut output = FloatImage::new(input.width(), input.height(), input.channels());
    attenuate_into(
        pool,
        input.pixels(),
        output.pixels_mut(),
        input.width(),
        input.height(),
        input.channels(),
        quality,
    );
    Ok(output)
}

/// Raw-array form of [`hf_attenuate`]; `src` and `dst` hold
/// `width * height * channels` interleaved samples.
pub fn block_transform_attenuate(
    pool: &ThreadPool,
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
    quality: i32,
) -> Result<()> {
    let samples = checked_samples(width, height, channels)?;
    require_len(src.len(), samples)?;
    require_len(dst.len(), samples)?;
    attenuate_into(pool, &src[..samples], dst, width, height, channels, quality);
    Ok(())
}
