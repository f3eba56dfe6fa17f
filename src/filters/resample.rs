//! Separable cubic resampler.
//!
//! Each axis gets a table of [`CubicPhase`]s, one per destination index,
//! built once per call and shared read-only by every worker. Shrinking uses
//! area coverage weights; enlarging (and identity) uses a 4-tap Catmull-Rom
//! kernel. Source indices outside the image are mirrored.

use crate::error::{BufferIssue, PixmaskError, Result};
use crate::filters::boundary::mirror_index;
use crate::filters::{checked_samples, require_len};
use crate::image::FloatImage;
use crate::pixels::{self, PixelView, PixelViewMut};
use crate::pool::ThreadPool;

// Catmull-Rom
const CUBIC_A: f32 = -0.5;

/// Taps contributing to one destination coordinate along one axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CubicPhase {
    pub indices: Vec<usize>,
    pub weights: Vec<f32>,
}

impl CubicPhase {
    fn push(&mut self, index: usize, weight: f32) {
        self.indices.push(index);
        self.weights.push(weight);
    }

    fn normalize_or_fallback(&mut self, fallback: usize) {
        let sum: f32 = self.weights.iter().sum();
        if sum != 0.0 {
            let inv = 1.0 / sum;
            self.weights.iter_mut().for_each(|w| *w *= inv);
        } else {
            self.indices.clear();
            self.weights.clear();
            self.push(fallback, 1.0);
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn taps(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.weights.iter().copied())
    }

    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().sum()
    }

    #[inline]
    fn apply(&self, samples: &[f32], stride: usize, offset: usize) -> f32 {
        let mut acc = 0.0;
        for (&index, &weight) in self.indices.iter().zip(&self.weights) {
            acc += weight * samples[index * stride + offset];
        }
        acc
    }
}

fn cubic_kernel(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    let x3 = x2 * x;
    if x < 1.0 {
        (CUBIC_A + 2.0) * x3 - (CUBIC_A + 3.0) * x2 + 1.0
    } else if x < 2.0 {
        CUBIC_A * x3 - 5.0 * CUBIC_A * x2 + 8.0 * CUBIC_A * x - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// One phase per destination index. Empty when either size is zero.
pub fn build_weight_table(src_size: usize, dst_size: usize) -> Vec<CubicPhase> {
    if src_size == 0 || dst_size == 0 {
        return Vec::new();
    }

    let scale = dst_size as f32 / src_size as f32;
    let inv_scale = src_size as f32 / dst_size as f32;
    let downscale = scale < 1.0;

    let table: Vec<CubicPhase> = (0..dst_size)
        .map(|i| {
            if downscale {
                area_phase(i, src_size, scale, inv_scale)
            } else {
                cubic_phase(i, src_size, inv_scale)
            }
        })
        .collect();

    log::trace!(
        "weight table {} -> {}: {} taps max",
        src_size,
        dst_size,
        table.iter().map(CubicPhase::len).max().unwrap_or(0)
    );
    table
}

// walk the source cells covering [start, start + 1/scale) weighted by coverage
fn area_phase(i: usize, src_size: usize, scale: f32, inv_scale: f32) -> CubicPhase {
    let start = i as f32 * inv_scale;
    let end = start + inv_scale;
    let mut phase = CubicPhase::default();

    let mut current = start;
    let mut cell = current.floor() as isize;
    while current < end {
        let next = end.min((cell + 1) as f32);
        let coverage = next - current;
        if coverage > 0.0 {
            phase.push(mirror_index(cell, src_size), coverage * scale);
        }
        current = next;
        cell += 1;
    }

    phase.normalize_or_fallback(mirror_index(start.round() as isize, src_size));
    phase
}

fn cubic_phase(i: usize, src_size: usize, inv_scale: f32) -> CubicPhase {
    let src_pos = (i as f32 + 0.5) * inv_scale - 0.5;
    let base = src_pos.floor() as isize - 1;
    let mut phase = CubicPhase::default();

    for tap in 0..4 {
        let index = base + tap;
        let weight = cubic_kernel(src_pos - index as f32);
        if weight == 0.0 {
            continue;
        }
        phase.push(mirror_index(index, src_size), weight);
    }

    phase.normalize_or_fallback(mirror_index(src_pos.round() as isize, src_size));
    phase
}

/// Resizes `input` to `new_width x new_height`, clamping the result to `[0, 1]`.
pub fn resample_cubic(
    pool: &ThreadPool,
    input: &FloatImage,
    new_width: usize,
    new_height: usize,
) -> Result<FloatImage> {
    if new_width == 0 || new_height == 0 {
        return Err(PixmaskError::DegenerateResize {
            width: new_width,
            height: new_height,
        });
    }
    if input.is_empty() || input.channels() == 0 {
        return Err(BufferIssue::ZeroDimension.into());
    }

    let channels = input.channels();
    let (width, height) = input.dimensions();
    let horizontal = build_weight_table(width, new_width);
    let vertical = build_weight_table(height, new_height);

    let src = input.pixels();
    let mut intermediate = vec![0.0f32; new_width * height * channels];
    pool.parallel_chunks_mut(&mut intermediate, new_width * channels, |y, dst_row| {
        let src_row = &src[y * width * channels..(y + 1) * width * channels];
        for (phase, dst_pixel) in horizontal.iter().zip(dst_row.chunks_exact_mut(channels)) {
            for (c, out) in dst_pixel.iter_mut().enumerate() {
                *out = phase.apply(src_row, channels, c);
            }
        }
    });

    let row_len = new_width * channels;
    let mut output = FloatImage::new(new_width, new_height, channels);
    pool.parallel_chunks_mut(output.pixels_mut(), row_len, |y, dst_row| {
        let phase = &vertical[y];
        for (offset, out) in dst_row.iter_mut().enumerate() {
            *out = phase.apply(&intermediate, row_len, offset).clamp(0.0, 1.0);
        }
    });

    Ok(output)
}

/// Raw-array resize: `src` holds `src_width * src_height * channels`
/// interleaved samples, `dst` receives `dst_width * dst_height * channels`.
#[allow(clippy::too_many_arguments)]
pub fn cubic_resample(
    pool: &ThreadPool,
    src: &[f32],
    dst: &mut [f32],
    src_width: usize,
    src_height: usize,
    channels: usize,
    dst_width: usize,
    dst_height: usize,
) -> Result<()> {
    let samples = checked_samples(src_width, src_height, channels)?;
    let needed = checked_samples(dst_width, dst_height, channels)?;
    require_len(src.len(), samples)?;
    require_len(dst.len(), needed)?;
    let input = FloatImage::from_vec(src_width, src_height, channels, src[..samples].to_vec())?;
    let output = resample_cubic(pool, &input, dst_width, dst_height)?;
    dst[..needed].copy_from_slice(output.pixels());
    Ok(())
}

/// Target size of one axis scaled by `scale`, rounded to nearest.
pub fn scaled_size(size: usize, scale: f64) -> usize {
    (size as f64 * scale).round().max(0.0) as usize
}

/// Buffer-level resize. `output` must be exactly `round(input.dims * scale)`.
pub fn resample(
    pool: &ThreadPool,
    input: &PixelView<'_>,
    output: &mut PixelViewMut<'_>,
    scale_x: f32,
    scale_y: f32,
) -> Result<()> {
    if !(scale_x.is_finite() && scale_y.is_finite() && scale_x > 0.0 && scale_y > 0.0) {
        return Err(PixmaskError::InvalidScale { scale_x, scale_y });
    }
    let target_width = scaled_size(input.width(), f64::from(scale_x));
    let target_height = scaled_size(input.height(), f64::from(scale_y));
    if target_width == 0 || target_height == 0 {
        return Err(PixmaskError::DegenerateResize {
            width: target_width,
            height: target_height,
        });
    }
    if output.dimensions() != (target_width, target_height) {
        return Err(PixmaskError::DimensionMismatch {
            expected_width: target_width,
            expected_height: target_height,
            width: output.width(),
            height: output.height(),
        });
    }

    let source = pixels::to_float_image(pool, input);
    let resized = resample_cubic(pool, &source, target_width, target_height)
        .map_err(|e| PixmaskError::stage("resample", e))?;
    pixels::write_float_image(pool, &resized, output)
}

