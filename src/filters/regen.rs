//! Fixed-weight detail regeneration: three 3x3 convolutions over a
//! mirror-padded input, then a 2x pixel shuffle.

use crate::error::{BufferIssue, PixmaskError, Result};
use crate::filters::boundary::mirror_index;
use crate::filters::regen_weights::{ConvLayer, INPUT_CHANNELS, KERNEL, LAYERS, UPSCALE};
use crate::image::FloatImage;
use crate::pixels::{self, PixelView, PixelViewMut};
use crate::pool::ThreadPool;

fn convolve3x3(
    pool: &ThreadPool,
    input: &[f32],
    width: usize,
    height: usize,
    layer: &ConvLayer,
) -> Vec<f32> {
    let (in_c, out_c) = (layer.in_channels, layer.out_channels);
    let in_row = width * in_c;
    let taps = KERNEL * KERNEL * in_c;
    let mut output = vec![0.0f32; width * height * out_c];

    pool.parallel_chunks_mut(&mut output, width * out_c, |y, out_row| {
        let ys = [-1isize, 0, 1].map(|d| mirror_index(y as isize + d, height));
        for (x, out_pixel) in out_row.chunks_exact_mut(out_c).enumerate() {
            let xs = [-1isize, 0, 1].map(|d| mirror_index(x as isize + d, width));

            for (oc, out) in out_pixel.iter_mut().enumerate() {
                let kernel = &layer.weights[oc * taps..(oc + 1) * taps];
                let mut acc = layer.bias[oc];
                for (ky, &sy) in ys.iter().enumerate() {
                    for (kx, &sx) in xs.iter().enumerate() {
                        let pixel = &input[sy * in_row + sx * in_c..sy * in_row + (sx + 1) * in_c];
                        let weights = &kernel[(ky * KERNEL + kx) * in_c..(ky * KERNEL + kx + 1) * in_c];
                        for (w, v) in weights.iter().zip(pixel) {
                            acc += w * v;
                        }
                    }
                }
                *out = if layer.relu { acc.max(0.0) } else { acc };
            }
        }
    });
    output
}

// channel c of output pixel (2y + sub / 2, 2x + sub % 2) is input channel c * 4 + sub
fn pixel_shuffle(pool: &ThreadPool, input: &[f32], width: usize, height: usize) -> FloatImage {
    let channels = INPUT_CHANNELS;
    let in_c = channels * UPSCALE * UPSCALE;
    let out_width = width * UPSCALE;
    let mut output = FloatImage::new(out_width, height * UPSCALE, channels);

    pool.parallel_chunks_mut(output.pixels_mut(), out_width * channels, |oy, out_row| {
        let (y, sub_y) = (oy / UPSCALE, oy % UPSCALE);
        for (ox, out_pixel) in out_row.chunks_exact_mut(channels).enumerate() {
            let (x, sub_x) = (ox / UPSCALE, ox % UPSCALE);
            let sub = sub_y * UPSCALE + sub_x;
            let base = (y * width + x) * in_c;
            for (c, out) in out_pixel.iter_mut().enumerate() {
                *out = input[base + c * UPSCALE * UPSCALE + sub].clamp(0.0, 1.0);
            }
        }
    });
    output
}

/// Runs the network on a 3-channel image, producing one twice as large in
/// each dimension with every sample in `[0, 1]`.
pub fn regenerate(pool: &ThreadPool, input: &FloatImage) -> Result<FloatImage> {
    if input.is_empty() {
        return Err(BufferIssue::ZeroDimension.into());
    }
    if input.channels() != INPUT_CHANNELS {
        return Err(BufferIssue::ChannelCountMismatch {
            samples: input.len(),
            width: input.width(),
            height: input.height(),
        }
        .into());
    }

    let (width, height) = input.dimensions();
    let features = LAYERS.iter().fold(input.pixels().to_vec(), |acc, layer| {
        convolve3x3(pool, &acc, width, height, layer)
    });
    Ok(pixel_shuffle(pool, &features, width, height))
}

/// Buffer-level regeneration. `output` must be exactly twice `input` in each dimension.
pub fn regenerate_detail(
    pool: &ThreadPool,
    input: &PixelView<'_>,
    output: &mut PixelViewMut<'_>,
) -> Result<()> {
    let expected = (input.width() * UPSCALE, input.height() * UPSCALE);
    if output.dimensions() != expected {
        return Err(PixmaskError::DimensionMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            width: output.width(),
            height: output.height(),
        });
    }

    let source = pixels::to_float_image(pool, input);
    let regenerated = regenerate(pool, &source).map_err(|e| PixmaskError::stage("regenerate", e))?;
    pixels::write_float_image(pool, &regenerated, output)
}
