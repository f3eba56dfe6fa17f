//! Numeric stages of the pipeline. Each stage has a [`FloatImage`] form and a
//! raw interleaved-array form for callers with their own buffer management.
//!
//! [`FloatImage`]: crate::image::FloatImage

pub mod bitdepth;
pub mod boundary;
pub mod dct;
pub mod prefilter;
pub mod regen;
pub mod regen_weights;
pub mod resample;

use crate::error::{BufferIssue, Result};

// sample count of a raw interleaved array, rejecting empty or overflowing shapes
pub(crate) fn checked_samples(width: usize, height: usize, channels: usize) -> Result<usize> {
    if width == 0 || height == 0 || channels == 0 {
        return Err(BufferIssue::ZeroDimension.into());
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            BufferIssue::InsufficientData {
                actual: 0,
                required: usize::MAX,
            }
            .into()
        })
}

pub(crate) fn require_len(len: usize, samples: usize) -> Result<()> {
    if len < samples {
        return Err(BufferIssue::InsufficientData {
            actual: len,
            required: samples,
        }
        .into());
    }
    Ok(())
}
