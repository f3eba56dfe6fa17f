//! The end-to-end sanitize pipeline and the [`Pixmask`] engine handle.
//!
//! ```text
//! input -> float -> downscale -> quantize -> attenuate -> mix
//!                                                          |-> upscale ----------------> A
//!                                                          '-> half size -> regenerate -> B
//! output <- format <- clamp(wB * B + wA * A + wO * float)
//! ```
//!
//! The pipeline never branches on content. Any failing stage aborts the call
//! before the caller's output buffer is touched.

use std::time::Instant;

use serde::Serialize;

use crate::config::PixmaskConfig;
use crate::error::{BufferIssue, PixmaskError, Result};
use crate::filters::bitdepth::quantize_image;
use crate::filters::dct::hf_attenuate;
use crate::filters::regen::{self, regenerate};
use crate::filters::regen_weights::UPSCALE;
use crate::filters::resample::{self, resample_cubic};
use crate::image::{FloatImage, CANONICAL_CHANNELS};
use crate::pixels::{self, PixelFormat, PixelView, PixelViewMut};
use crate::pool::ThreadPool;
use crate::vectorization::{par_blend2_clamped, par_blend3_clamped};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed_ms: f64,
}

/// What a successful [`Pixmask::sanitize`] call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizeReport {
    pub width: usize,
    pub height: usize,
    pub input_format: PixelFormat,
    pub output_format: PixelFormat,
    pub workers: usize,
    pub stages: Vec<StageTiming>,
    pub total_ms: f64,
}

#[derive(Debug, Default)]
struct StageClock {
    stages: Vec<StageTiming>,
}

impl StageClock {
    fn run<T>(&mut self, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f().map_err(|e| PixmaskError::stage(stage, e));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => log::debug!("stage {} took {:.3} ms", stage, elapsed_ms),
            Err(e) => log::debug!("stage {} failed after {:.3} ms: {}", stage, elapsed_ms, e),
        }
        self.stages.push(StageTiming { stage, elapsed_ms });
        result
    }
}

/// `round(size * factor)`, never below 1.
pub fn scaled_dimension(size: usize, factor: f64) -> usize {
    resample::scaled_size(size, factor).max(1)
}

fn check_even(width: usize, height: usize) -> Result<()> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(PixmaskError::OddDimensions { width, height });
    }
    Ok(())
}

fn run_pipeline(
    pool: &ThreadPool,
    config: &PixmaskConfig,
    original: &FloatImage,
    clock: &mut StageClock,
) -> Result<FloatImage> {
    let (width, height) = original.dimensions();
    check_even(width, height)?;

    let low_width = scaled_dimension(width, config.downscale_factor);
    let low_height = scaled_dimension(height, config.downscale_factor);
    let mut low = clock.run("downscale", || resample_cubic(pool, original, low_width, low_height))?;

    clock.run("quantize", || quantize_image(pool, &mut low, config.bit_depth))?;

    let attenuated = clock.run("attenuate", || hf_attenuate(pool, &low, config.dct_quality))?;

    let mixed = clock.run("mix", || {
        let mut mixed = FloatImage::new(low_width, low_height, CANONICAL_CHANNELS);
        par_blend2_clamped(
            pool,
            mixed.pixels_mut(),
            attenuated.pixels(),
            low.pixels(),
            config.attenuation_mix,
            1.0 - config.attenuation_mix,
        );
        Ok(mixed)
    })?;

    let upscaled = clock.run("upscale", || resample_cubic(pool, &mixed, width, height))?;

    let half = clock.run("half_scale", || {
        resample_cubic(pool, &mixed, width / UPSCALE, height / UPSCALE)
    })?;
    let regenerated = clock.run("regenerate", || {
        let image = regenerate(pool, &half)?;
        if image.dimensions() != (width, height) {
            return Err(PixmaskError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(image)
    })?;

    clock.run("composite", || {
        let weights = &config.blend;
        let mut output = FloatImage::new(width, height, CANONICAL_CHANNELS);
        par_blend3_clamped(
            pool,
            output.pixels_mut(),
            regenerated.pixels(),
            upscaled.pixels(),
            original.pixels(),
            weights.regenerated,
            weights.upscaled,
            weights.original,
        );
        Ok(output)
    })
}

/// Sanitizes a canonical float image with an explicit pool and config.
pub fn sanitize_float(pool: &ThreadPool, config: &PixmaskConfig, input: &FloatImage) -> Result<FloatImage> {
    if input.is_empty() {
        return Err(BufferIssue::ZeroDimension.into());
    }
    if input.channels() != CANONICAL_CHANNELS {
        return Err(BufferIssue::ChannelCountMismatch {
            samples: input.len(),
            width: input.width(),
            height: input.height(),
        }
        .into());
    }
    run_pipeline(pool, config, input, &mut StageClock::default())
}

/// Buffer-level sanitize with an explicit pool and config.
///
/// `input` and `output` must have equal, even dimensions; their formats may
/// differ. `output` is written only once every stage has succeeded.
pub fn sanitize_with(
    pool: &ThreadPool,
    config: &PixmaskConfig,
    input: &PixelView<'_>,
    output: &mut PixelViewMut<'_>,
) -> Result<SanitizeReport> {
    let start = Instant::now();
    if input.dimensions() != output.dimensions() {
        return Err(PixmaskError::DimensionMismatch {
            expected_width: output.width(),
            expected_height: output.height(),
            width: input.width(),
            height: input.height(),
        });
    }
    check_even(output.width(), output.height())?;

    let mut clock = StageClock::default();
    let original = clock.run("to_float", || Ok(pixels::to_float_image(pool, input)))?;
    let sanitized = run_pipeline(pool, config, &original, &mut clock)?;
    clock.run("from_float", || pixels::write_float_image(pool, &sanitized, output))?;

    let report = SanitizeReport {
        width: output.width(),
        height: output.height(),
        input_format: input.format(),
        output_format: output.format(),
        workers: pool.size(),
        stages: clock.stages,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    log::debug!(
        "sanitized {}x{} {:?} -> {:?} in {:.3} ms",
        report.width,
        report.height,
        report.input_format,
        report.output_format,
        report.total_ms
    );
    Ok(report)
}

/// Engine handle: owns the worker pool and the pipeline configuration.
///
/// Create one at startup and share it by reference; dropping it joins the
/// workers.
#[derive(Debug)]
pub struct Pixmask {
    pool: ThreadPool,
    config: PixmaskConfig,
}

impl Pixmask {
    pub fn new(config: PixmaskConfig) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPool::new(config.resolved_workers());
        Ok(Pixmask { pool, config })
    }

    /// Default configuration with `PIXMASK_THREADS` applied.
    pub fn from_env() -> Result<Self> {
        Self::new(PixmaskConfig::default().with_env_overrides())
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn config(&self) -> &PixmaskConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Restarts the pool with `workers` workers (at least one).
    pub fn set_workers(&mut self, workers: usize) {
        self.pool.resize(workers);
        self.config.workers = Some(self.pool.size());
    }

    pub fn sanitize(&self, input: &PixelView<'_>, output: &mut PixelViewMut<'_>) -> Result<SanitizeReport> {
        sanitize_with(&self.pool, &self.config, input, output)
    }

    pub fn sanitize_image(&self, input: &FloatImage) -> Result<FloatImage> {
        sanitize_float(&self.pool, &self.config, input)
    }

    pub fn resample(
        &self,
        input: &PixelView<'_>,
        output: &mut PixelViewMut<'_>,
        scale_x: f32,
        scale_y: f32,
    ) -> Result<()> {
        resample::resample(&self.pool, input, output, scale_x, scale_y)
    }

    pub fn regenerate_detail(&self, input: &PixelView<'_>, output: &mut PixelViewMut<'_>) -> Result<()> {
        regen::regenerate_detail(&self.pool, input, output)
    }

    pub fn convert(&self, input: &PixelView<'_>, output: &mut PixelViewMut<'_>) -> Result<()> {
        pixels::convert(&self.pool, input, output)
    }
}
