// STABLE TOOLCHAIN, SIMD GOES THROUGH std::arch WITH RUNTIME DETECTION

//! Pre-inference image sanitization.
//!
//! `pixmask` takes an RGB/RGBA pixel buffer and returns a same-size buffer
//! with low-amplitude, high-frequency structure (the usual shape of an
//! adversarial pixel perturbation) removed, while keeping the visible content.
//! The pipeline downscales, quantizes with ordered dither, attenuates high
//! frequencies per 8x8 block, then rebuilds full resolution from a direct
//! cubic upscale and a fixed-weight regeneration network before blending
//! with the original.
//!
//! ```no_run
//! use pixmask::{PixelFormat, PixelView, PixelViewMut, Pixmask, PixmaskConfig};
//!
//! let engine = Pixmask::new(PixmaskConfig::default())?;
//! let input = vec![128u8; 64 * 64 * 3];
//! let mut output = vec![0u8; 64 * 64 * 3];
//! let src = PixelView::packed(PixelFormat::Rgb8, 64, 64, &input)?;
//! let mut dst = PixelViewMut::packed(PixelFormat::Rgb8, 64, 64, &mut output)?;
//! engine.sanitize(&src, &mut dst)?;
//! # Ok::<(), pixmask::PixmaskError>(())
//! ```

pub mod config; // pipeline tunables
pub mod cpu_caps; // hardware query
pub mod error; // error taxonomy
pub mod filters; // numeric stages
pub mod image; // canonical float image
pub mod pixels; // caller buffer views and format conversion
pub mod pool; // work-stealing thread pool
pub mod sanitize; // orchestrator and engine handle
pub mod security; // host-side pre-checks
pub mod vectorization; // simd blend kernels


pub use config::{BlendWeights, PixmaskConfig};
pub use error::{BufferIssue, PixmaskError, Result};
pub use filters::bitdepth::quantize_bitdepth;
pub use filters::dct::block_transform_attenuate;
pub use filters::prefilter::prefilter;
pub use filters::regen::regenerate_detail;
pub use filters::resample::resample;
pub use image::FloatImage;
pub use pixels::{convert, PixelFormat, PixelView, PixelViewMut};
pub use pool::ThreadPool;
pub use sanitize::{sanitize_with, Pixmask, SanitizeReport};

/// Crate version, `major.minor.patch`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Target triple and cargo profile this build was produced with.
pub fn build_info() -> (&'static str, &'static str) {
    (env!("PIXMASK_BUILD_TARGET"), env!("PIXMASK_BUILD_PROFILE"))
}
