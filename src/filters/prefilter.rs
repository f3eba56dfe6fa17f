//! Cubic B-spline prefilter.
//!
//! Turns samples into B-spline coefficients so a later cubic B-spline
//! evaluation interpolates the original values. Each line solves the
//! tridiagonal system `c[i-1] + 4 c[i] + c[i+1] = 6 s[i]` with mirrored ends.

use crate::error::Result;
use crate::filters::{checked_samples, require_len};
use crate::image::FloatImage;
use crate::pool::ThreadPool;

#[inline]
fn upper(i: usize) -> f32 {
    if i == 0 {
        2.0
    } else {
        1.0
    }
}

#[inline]
fn lower(i: usize, len: usize) -> f32 {
    if i == len - 2 {
        2.0
    } else {
        1.0
    }
}

// thomas algorithm over the samples line[offset + i * stride], i in 0..len
fn solve_line(
    line: &mut [f32],
    len: usize,
    stride: usize,
    offset: usize,
    diag: &mut Vec<f32>,
    rhs: &mut Vec<f32>,
) {
    if len < 2 {
        return;
    }
    diag.clear();
    diag.resize(len, 4.0);
    rhs.clear();
    rhs.extend((0..len).map(|i| 6.0 * line[offset + i * stride]));

    for i in 1..len {
        let factor = lower(i - 1, len) / diag[i - 1];
        diag[i] -= factor * upper(i - 1);
        rhs[i] -= factor * rhs[i - 1];
    }

    let mut next = rhs[len - 1] / diag[len - 1];
    line[offset + (len - 1) * stride] = next;
    for i in (0..len - 1).rev() {
        next = (rhs[i] - upper(i) * next) / diag[i];
        line[offset + i * stride] = next;
    }
}

fn prefilter_into(pool: &ThreadPool, data: &mut [f32], width: usize, height: usize, channels: usize) {
    let row_len = width * channels;
    let column_len = height * channels;

    pool.parallel_chunks_mut(data, row_len, |_, row| {
        let (mut diag, mut rhs) = (Vec::with_capacity(width), Vec::with_capacity(width));
        for c in 0..channels {
            solve_line(row, width, channels, c, &mut diag, &mut rhs);
        }
    });

    if height < 2 {
        return;
    }

    // columns go through a column-major copy so every task owns a contiguous slice
    let mut columns = vec![0.0f32; width * column_len];
    {
        let rows: &[f32] = &*data;
        pool.parallel_chunks_mut(&mut columns, column_len, |x, column| {
            let (mut diag, mut rhs) = (Vec::with_capacity(height), Vec::with_capacity(height));
            for y in 0..height {
                let src = (y * width + x) * channels;
                column[y * channels..(y + 1) * channels].copy_from_slice(&rows[src..src + channels]);
            }
            for c in 0..channels {
                solve_line(column, height, channels, c, &mut diag, &mut rhs);
            }
        });
    }

    pool.parallel_chunks_mut(data, row_len, |y, row| {
        for x in 0..width {
            let src = x * column_len + y * channels;
            row[x * channels..(x + 1) * channels].copy_from_slice(&columns[src..src + channels]);
        }
    });
}

/// Raw-array prefilter: `dst` receives the coefficients for `src`, both
/// holding `width * height * channels` interleaved samples.
pub fn prefilter(
    pool: &ThreadPool,
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<()> {
    let samples = checked_samples(width, height, channels)?;
    require_len(src.len(), samples)?;
    require_len(dst.len(), samples)?;

    let dst = &mut dst[..samples];
    dst.copy_from_slice(&src[..samples]);
    prefilter_into(pool, dst, width, height, channels);
    Ok(())
}

pub fn b_spline_prefilter(pool: &ThreadPool, input: &FloatImage) -> FloatImage {
    let mut output = input.clone();
    if output.is_empty() {
        return output;
    }
    let (width, height, channels) = (output.width(), output.height(), output.channels());
    prefilter_into(pool, output.pixels_mut(), width, height, channels);
    output
}
