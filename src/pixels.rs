//! Caller-owned pixel buffers and conversion to and from the canonical float form.
//!
//! [`PixelView`] and [`PixelViewMut`] borrow caller memory; the core never
//! allocates or frees it. Rows may be padded (`stride_bytes` larger than the
//! packed row). Float samples are native-endian `f32` and are read with
//! `from_ne_bytes`, so the byte slice needs no particular alignment.

use serde::{Deserialize, Serialize};

use crate::error::{BufferIssue, PixmaskError, Result};
use crate::image::{FloatImage, CANONICAL_CHANNELS};
use crate::pool::ThreadPool;

const INV_255: f32 = 1.0 / 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    RgbF32,
}

impl PixelFormat {
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::RgbF32 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    pub const fn bytes_per_channel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => 1,
            PixelFormat::RgbF32 => 4,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        self.channels() * self.bytes_per_channel()
    }

    /// Binding-layer format code.
    pub const fn code(self) -> u32 {
        match self {
            PixelFormat::Rgb8 => 0,
            PixelFormat::Rgba8 => 1,
            PixelFormat::RgbF32 => 2,
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = PixmaskError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(PixelFormat::Rgb8),
            1 => Ok(PixelFormat::Rgba8),
            2 => Ok(PixelFormat::RgbF32),
            other => Err(PixmaskError::UnsupportedFormat(other)),
        }
    }
}

fn check_layout(
    format: PixelFormat,
    width: usize,
    height: usize,
    stride_bytes: usize,
    len: usize,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(BufferIssue::ZeroDimension.into());
    }
    if len == 0 {
        return Err(BufferIssue::EmptyData.into());
    }
    let row_bytes = width
        .checked_mul(format.bytes_per_pixel())
        .ok_or(BufferIssue::InsufficientData {
            actual: len,
            required: usize::MAX,
        })?;
    if stride_bytes < row_bytes {
        return Err(BufferIssue::StrideTooSmall {
            stride: stride_bytes,
            row_bytes,
        }
        .into());
    }
    let channel_bytes = format.bytes_per_channel();
    if stride_bytes % channel_bytes != 0 {
        return Err(BufferIssue::StrideMisaligned {
            stride: stride_bytes,
            channel_bytes,
        }
        .into());
    }
    let required = stride_bytes
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(row_bytes))
        .unwrap_or(usize::MAX);
    if len < required {
        return Err(BufferIssue::InsufficientData {
            actual: len,
            required,
        }
        .into());
    }
    Ok(())
}

/// Read-only view of a caller pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    format: PixelFormat,
    width: usize,
    height: usize,
    stride_bytes: usize,
    data: &'a [u8],
}

impl<'a> PixelView<'a> {
    pub fn new(
        format: PixelFormat,
        width: usize,
        height: usize,
        stride_bytes: usize,
        data: &'a [u8],
    ) -> Result<Self> {
        check_layout(format, width, height, stride_bytes, data.len())?;
        Ok(PixelView {
            format,
            width,
            height,
            stride_bytes,
            data,
        })
    }

    /// View over unpadded rows.
    pub fn packed(format: PixelFormat, width: usize, height: usize, data: &'a [u8]) -> Result<Self> {
        let stride = width.saturating_mul(format.bytes_per_pixel());
        Self::new(format, width, height, stride, data)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    pub fn row_bytes(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    /// Packed bytes of row `y`, padding excluded.
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride_bytes;
        &self.data[start..start + self.row_bytes()]
    }
}

/// Writable view of a caller pixel buffer.
#[derive(Debug)]
pub struct PixelViewMut<'a> {
    format: PixelFormat,
    width: usize,
    height: usize,
    stride_bytes: usize,
    data: &'a mut [u8],
}

impl<'a> PixelViewMut<'a> {
    pub fn new(
        format: PixelFormat,
        width: usize,
        height: usize,
        stride_bytes: usize,
        data: &'a mut [u8],
    ) -> Result<Self> {
        check_layout(format, width, height, stride_bytes, data.len())?;
        Ok(PixelViewMut {
            format,
            width,
            height,
            stride_bytes,
            data,
        })
    }

    pub fn packed(
        format: PixelFormat,
        width: usize,
        height: usize,
        data: &'a mut [u8],
    ) -> Result<Self> {
        let stride = width.saturating_mul(format.bytes_per_pixel());
        Self::new(format, width, height, stride, data)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    pub fn as_view(&self) -> PixelView<'_> {
        PixelView {
            format: self.format,
            width: self.width,
            height: self.height,
            stride_bytes: self.stride_bytes,
            data: self.data,
        }
    }
}

#[inline]
fn float_to_u8(value: f32) -> u8 {
    // NaN saturates to 0 through the cast
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decodes a caller buffer into canonical 3-channel float form. Alpha is dropped.
pub fn to_float_image(pool: &ThreadPool, src: &PixelView<'_>) -> FloatImage {
    let width = src.width();
    let mut image = FloatImage::new(width, src.height(), CANONICAL_CHANNELS);
    let format = src.format();

    pool.parallel_chunks_mut(image.pixels_mut(), width * CANONICAL_CHANNELS, |y, dst| {
        let row = src.row(y);
        match format {
            PixelFormat::Rgb8 => {
                for (d, &s) in dst.iter_mut().zip(row) {
                    *d = f32::from(s) * INV_255;
                }
            }
            PixelFormat::Rgba8 => {
                for (d, s) in dst.chunks_exact_mut(3).zip(row.chunks_exact(4)) {
                    d[0] = f32::from(s[0]) * INV_255;
                    d[1] = f32::from(s[1]) * INV_255;
                    d[2] = f32::from(s[2]) * INV_255;
                }
            }
            PixelFormat::RgbF32 => {
                for (d, s) in dst.iter_mut().zip(row.chunks_exact(4)) {
                    *d = read_f32(s);
                }
            }
        }
    });
    image
}

/// Encodes a canonical float image into a caller buffer of equal dimensions.
///
/// 8-bit targets are clamped and rounded; RGBA targets get opaque alpha.
/// Float targets receive the samples unchanged. Padding bytes are untouched.
pub fn write_float_image(
    pool: &ThreadPool,
    src: &FloatImage,
    dst: &mut PixelViewMut<'_>,
) -> Result<()> {
    if src.channels() != CANONICAL_CHANNELS {
        return Err(BufferIssue::ChannelCountMismatch {
            samples: src.len(),
            width: src.width(),
            height: src.height(),
        }
        .into());
    }
    if src.dimensions() != dst.dimensions() {
        return Err(PixmaskError::DimensionMismatch {
            expected_width: dst.width(),
            expected_height: dst.height(),
            width: src.width(),
            height: src.height(),
        });
    }

    let format = dst.format();
    let height = dst.height();
    let row_bytes = dst.as_view().row_bytes();
    let stride = dst.stride_bytes();

    pool.parallel_chunks_mut(&mut *dst.data, stride, |y, out| {
        if y >= height {
            return;
        }
        let out = &mut out[..row_bytes];
        let row = src.row(y);
        match format {
            PixelFormat::Rgb8 => {
                for (o, &s) in out.iter_mut().zip(row) {
                    *o = float_to_u8(s);
                }
            }
            PixelFormat::Rgba8 => {
                for (o, s) in out.chunks_exact_mut(4).zip(row.chunks_exact(3)) {
                    o[0] = float_to_u8(s[0]);
                    o[1] = float_to_u8(s[1]);
                    o[2] = float_to_u8(s[2]);
                    o[3] = u8::MAX;
                }
            }
            PixelFormat::RgbF32 => {
                for (o, &s) in out.chunks_exact_mut(4).zip(row) {
                    o.copy_from_slice(&s.to_ne_bytes());
                }
            }
        }
    });
    Ok(())
}

/// Converts between any two supported formats of equal dimensions.
pub fn convert(pool: &ThreadPool, src: &PixelView<'_>, dst: &mut PixelViewMut<'_>) -> Result<()> {
    if src.dimensions() != dst.dimensions() {
        return Err(PixmaskError::DimensionMismatch {
            expected_width: dst.width(),
            expected_height: dst.height(),
            width: src.width(),
            height: src.height(),
        });
    }

    if src.format() == dst.format() {
        let row_bytes = src.row_bytes();
        let height = src.height();
        let stride = dst.stride_bytes();
        pool.parallel_chunks_mut(&mut *dst.data, stride, |y, out| {
            if y < height {
                out[..row_bytes].copy_from_slice(src.row(y));
            }
        });
        return Ok(());
    }

    let image = to_float_image(pool, src);
    write_float_image(pool, &image, dst)
}
