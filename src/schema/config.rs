//! Configuration types for flood simulation sessions.

use serde::{Deserialize, Serialize};

fn default_smoothing_sigma() -> f64 {
    1.0
}

/// Largest accepted smoothing sigma, in prepared cells.
pub const MAX_SMOOTHING_SIGMA: f64 = 1000.0;

/// Top-level session configuration.
///
/// Supplied once when a session is created and immutable for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Decimation stride applied to the raw elevation grid (>= 1).
    pub downscale_factor: usize,
    /// Percentile of defined elevations used as the flood elevation (1-100).
    pub water_level_percent: u8,
    /// Growth rings applied per displayed frame (>= 1).
    pub flow_speed: u32,
    /// Pacing delay between frames in seconds. Not used by the simulation itself.
    pub frame_delay: f64,
    /// Gaussian smoothing sigma in prepared cells. 0 disables smoothing.
    #[serde(default = "default_smoothing_sigma")]
    pub smoothing_sigma: f64,
    /// How cells at or above the threshold are seeded.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Stop automatically after this many frames.
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            downscale_factor: 5,
            water_level_percent: 90,
            flow_speed: 5,
            frame_delay: 0.1,
            smoothing_sigma: 1.0,
            seed_policy: SeedPolicy::default(),
            max_frames: None,
        }
    }
}

/// Seeding policy for cells whose elevation is at or above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Seeds at the threshold are flooded; seeds strictly above it become
    /// source cells that feed growth but are never counted as flooded.
    #[default]
    Source,
    /// Every seed is flooded at frame 0. Seeds strictly above the threshold
    /// are dropped by the first advance.
    Transient,
}

impl SimulationConfig {
    /// Area represented by one prepared cell, in raw-cell units.
    #[inline]
    pub fn cell_area(&self) -> f64 {
        (self.downscale_factor * self.downscale_factor) as f64
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.downscale_factor == 0 {
            return Err(ConfigError::InvalidDownscaleFactor(self.downscale_factor));
        }
        if !(1..=100).contains(&self.water_level_percent) {
            return Err(ConfigError::InvalidWaterLevel(self.water_level_percent));
        }
        if self.flow_speed == 0 {
            return Err(ConfigError::InvalidFlowSpeed(self.flow_speed));
        }
        if !self.frame_delay.is_finite() || self.frame_delay < 0.0 {
            return Err(ConfigError::InvalidFrameDelay(self.frame_delay));
        }
        if !(0.0..=MAX_SMOOTHING_SIGMA).contains(&self.smoothing_sigma) {
            return Err(ConfigError::InvalidSmoothingSigma(self.smoothing_sigma));
        }
        if self.max_frames == Some(0) {
            return Err(ConfigError::InvalidMaxFrames);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Downscale factor must be at least 1 (got {0})")]
    InvalidDownscaleFactor(usize),
    #[error("Water level percent must be within 1-100 (got {0})")]
    InvalidWaterLevel(u8),
    #[error("Flow speed must be at least 1 ring per frame (got {0})")]
    InvalidFlowSpeed(u32),
    #[error("Frame delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidFrameDelay(f64),
    #[error("Smoothing sigma must be within 0-1000 (got {0})")]
    InvalidSmoothingSigma(f64),
    #[error("Max frames must be non-zero when set")]
    InvalidMaxFrames,
}
