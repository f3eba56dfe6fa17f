//! Cheap pre-checks a host runs on untrusted input before handing pixels to
//! the pipeline. Neither check is applied by the core itself.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_MAX_MEGAPIXELS: f64 = 40.0;

const MEGAPIXEL: f64 = 1_000_000.0;

/// Embedded-format markers that should never appear inside an image payload.
pub const POLYGLOT_SIGNATURES: [(&str, &[u8]); 8] = [
    ("pdf", b"%PDF-"),
    ("zip", b"PK\x03\x04"),
    ("xz", b"7zXZ"),
    ("rar", b"Rar!"),
    ("xml", b"<?xml"),
    ("doctype", b"<!DOCTYPE"),
    ("pe", b"MZ"),
    ("elf", b"ELF"),
];

/// Whether a `width x height` image exceeds `cap_megapixels`.
///
/// Empty images never exceed the cap. A non-positive cap rejects everything,
/// an infinite positive cap (or NaN) accepts everything.
pub fn exceeds_pixel_cap(width: usize, height: usize, cap_megapixels: f64) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    if !cap_megapixels.is_finite() {
        return cap_megapixels < 0.0;
    }
    if cap_megapixels <= 0.0 {
        return true;
    }
    let limit = cap_megapixels * MEGAPIXEL;
    (width as f64) * (height as f64) > limit
}

/// Name of the first embedded-format marker found in `bytes`, if any.
pub fn find_polyglot_signature(bytes: &[u8]) -> Option<&'static str> {
    POLYGLOT_SIGNATURES
        .iter()
        .find(|(_, needle)| bytes.len() >= needle.len() && bytes.windows(needle.len()).any(|w| w == *needle))
        .map(|(name, _)| *name)
}

pub fn suspicious_polyglot_bytes(bytes: &[u8]) -> bool {
    find_polyglot_signature(bytes).is_some()
}

#[derive(Debug, Error)]
pub enum FileCapError {
    #[error("cannot read image header of {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error("{} is {width}x{height}, over the {cap_megapixels} megapixel cap", path.display())]
    OverCap {
        path: PathBuf,
        width: usize,
        height: usize,
        cap_megapixels: f64,
    },
}

/// Applies the pixel cap to the dimensions declared in the file header at
/// `path`, without decoding any pixel data.
pub fn check_file_pixel_cap(path: &Path, cap_megapixels: f64) -> Result<(usize, usize), FileCapError> {
    let (width, height) = ::image::image_dimensions(path).map_err(|source| FileCapError::Header {
        path: path.to_path_buf(),
        source,
    })?;
    let (width, height) = (width as usize, height as usize);
    if exceeds_pixel_cap(width, height, cap_megapixels) {
        return Err(FileCapError::OverCap {
            path: path.to_path_buf(),
            width,
            height,
            cap_megapixels,
        });
    }
    Ok((width, height))
}
