use crate::error::{BufferIssue, PixmaskError, Result};

/// Channel count of the canonical float form.
pub const CANONICAL_CHANNELS: usize = 3;

/// Owned, tightly packed interleaved float image.
///
/// Samples are nominally in `[0, 1]`; intermediate stages may overshoot before
/// the next clamp. Every stage hands back a fresh `FloatImage`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FloatImage {
    width: usize,
    height: usize,
    channels: usize,
    pixels: Vec<f32>,
}

impl FloatImage {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self::filled(width, height, channels, 0.0)
    }

    pub fn filled(width: usize, height: usize, channels: usize, value: f32) -> Self {
        FloatImage {
            width,
            height,
            channels,
            pixels: vec![value; width * height * channels],
        }
    }

    /// Wraps `pixels`, which must hold exactly `width * height * channels` samples.
    pub fn from_vec(width: usize, height: usize, channels: usize, pixels: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(BufferIssue::ZeroDimension.into());
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(PixmaskError::InvalidBuffer(BufferIssue::ChannelCountMismatch {
                samples: pixels.len(),
                width,
                height,
            }))?;
        if pixels.len() != expected {
            return Err(BufferIssue::ChannelCountMismatch {
                samples: pixels.len(),
                width,
                height,
            }
            .into());
        }
        Ok(FloatImage {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Like [`from_vec`](Self::from_vec) but infers the channel count from the
    /// sample count.
    pub fn from_samples(width: usize, height: usize, pixels: Vec<f32>) -> Result<Self> {
        let channels = infer_channels(width, height, pixels.len())?;
        Self::from_vec(width, height, channels, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Samples per row.
    pub fn row_len(&self) -> usize {
        self.width * self.channels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.pixels
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let len = self.row_len();
        &self.pixels[y * len..(y + 1) * len]
    }

    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.pixels[(y * self.width + x) * self.channels + c]
    }

    pub fn set(&mut self, x: usize, y: usize, c: usize, value: f32) {
        let index = (y * self.width + x) * self.channels + c;
        self.pixels[index] = value;
    }
}

/// Channel count implied by `samples` for a `width x height` image.
pub fn infer_channels(width: usize, height: usize, samples: usize) -> Result<usize> {
    let count = width.checked_mul(height).unwrap_or(0);
    if count == 0 {
        return Err(BufferIssue::ZeroDimension.into());
    }
    if samples == 0 || samples % count != 0 {
        return Err(BufferIssue::ChannelCountMismatch {
            samples,
            width,
            height,
        }
        .into());
    }
    Ok(samples / count)
}
