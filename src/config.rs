//! Pipeline configuration.
//!
//! Every tunable of the sanitize pipeline lives here with its documented
//! default. A config can be built in code, loaded from JSON, and have its
//! worker count overridden through `PIXMASK_THREADS`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cpu_caps;
use crate::error::{PixmaskError, Result};

pub const DEFAULT_DOWNSCALE_FACTOR: f64 = 0.25;
pub const DEFAULT_BIT_DEPTH: u32 = 6;
pub const DEFAULT_DCT_QUALITY: i32 = 60;
pub const DEFAULT_ATTENUATION_MIX: f32 = 0.4;

pub const DEFAULT_REGENERATED_WEIGHT: f32 = 0.15;
pub const DEFAULT_UPSCALED_WEIGHT: f32 = 0.35;
pub const DEFAULT_ORIGINAL_WEIGHT: f32 = 0.50;

pub const THREADS_ENV: &str = "PIXMASK_THREADS";

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Weights of the final composite. They must sum to one.
///
/// The regenerated/upscaled split is a tunable default rather than a derived
/// optimum; other image distributions may want a different ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    /// Path B, the half-resolution image run through the regeneration network.
    pub regenerated: f32,
    /// Path A, the direct cubic upscale.
    pub upscaled: f32,
    /// The untouched input.
    pub original: f32,
}

impl Default for BlendWeights {
    fn default() -> Self {
        BlendWeights {
            regenerated: DEFAULT_REGENERATED_WEIGHT,
            upscaled: DEFAULT_UPSCALED_WEIGHT,
            original: DEFAULT_ORIGINAL_WEIGHT,
        }
    }
}

impl BlendWeights {
    pub fn sum(&self) -> f32 {
        self.regenerated + self.upscaled + self.original
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixmaskConfig {
    /// Pool size; `None` uses the hardware thread count.
    pub workers: Option<usize>,
    pub downscale_factor: f64,
    pub bit_depth: u32,
    pub dct_quality: i32,
    /// Weight of the attenuated signal when mixing it back with the
    /// pre-attenuation signal (which gets `1 - attenuation_mix`).
    pub attenuation_mix: f32,
    pub blend: BlendWeights,
}

impl Default for PixmaskConfig {
    fn default() -> Self {
        PixmaskConfig {
            workers: None,
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            bit_depth: DEFAULT_BIT_DEPTH,
            dct_quality: DEFAULT_DCT_QUALITY,
            attenuation_mix: DEFAULT_ATTENUATION_MIX,
            blend: BlendWeights::default(),
        }
    }
}

fn finite_non_negative(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PixmaskError::InvalidConfig(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

impl PixmaskConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PixmaskConfig =
            serde_json::from_str(json).map_err(|e| PixmaskError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PixmaskError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PixmaskError::Config(e.to_string()))
    }

    /// Applies `PIXMASK_THREADS` when it is set to a positive integer.
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = Some(n),
                _ => log::warn!("ignoring {}={:?}, expected a positive integer", THREADS_ENV, raw),
            }
        }
        self
    }

    /// Worker count the pool should be started with.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(cpu_caps::hw_threads).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(PixmaskError::InvalidConfig("workers must be at least 1".into()));
        }
        if !(self.downscale_factor > 0.0 && self.downscale_factor <= 1.0) {
            return Err(PixmaskError::InvalidConfig(format!(
                "downscale_factor must be in (0, 1], got {}",
                self.downscale_factor
            )));
        }
        if !(1..=8).contains(&self.bit_depth) {
            return Err(PixmaskError::InvalidConfig(format!(
                "bit_depth must be in 1..=8, got {}",
                self.bit_depth
            )));
        }
        if !(1..=100).contains(&self.dct_quality) {
            return Err(PixmaskError::InvalidConfig(format!(
                "dct_quality must be in 1..=100, got {}",
                self.dct_quality
            )));
        }
        finite_non_negative("attenuation_mix", self.attenuation_mix)?;
        if self.attenuation_mix > 1.0 {
            return Err(PixmaskError::InvalidConfig(format!(
                "attenuation_mix must be at most 1, got {}",
                self.attenuation_mix
            )));
        }

        let blend = &self.blend;
        finite_non_negative("blend.regenerated", blend.regenerated)?;
        finite_non_negative("blend.upscaled", blend.upscaled)?;
        finite_non_negative("blend.original", blend.original)?;
        if (blend.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PixmaskError::InvalidConfig(format!(
                "blend weights must sum to 1, got {}",
                blend.sum()
            )));
        }
        Ok(())
    }
}
