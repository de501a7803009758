//! Spectral subtraction and scalar Wiener filtering
//!
//! Both methods scale each bin `y` of a noisy spectrogram by a real gain
//! computed from `|y|²` and a per-bin noise power estimate `σ²`, so the
//! phase of `y` is kept:
//!
//! - power subtraction: `g = sqrt(max(|y|² - ασ², 0) / |y|²)`
//! - Wiener: `g = max(|y|² - ασ², 0) / |y|²`
//!
//! The gain is finally clamped to `[β, 1]`.

use tracing::debug;

use crate::error::{Result, StftError};
use crate::spectrogram::Spectrogram;
use crate::stft::Stft;
use crate::utils::power_to_db;

// ============================================================================
// Constants
// ============================================================================

/// Default over-subtraction factor
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Default gain floor; zero lets fully masked bins go silent
pub const DEFAULT_BETA: f64 = 0.0;

/// Maximum over-subtraction factor
pub const MAX_ALPHA: f64 = 5.0;

// ============================================================================
// Noise Profile
// ============================================================================

/// Mean noise power per frequency bin
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseProfile {
    power: Vec<f64>,
    frames_averaged: usize,
}

impl NoiseProfile {
    /// Profile from an explicit per-bin power estimate
    pub fn from_power(power: Vec<f64>) -> Result<Self> {
        if power.is_empty() {
            return Err(StftError::config("noise profile needs at least one bin"));
        }
        if let Some(bad) = power.iter().find(|p| !(p.is_finite() && **p >= 0.0)) {
            return Err(StftError::config(format!("invalid noise power {}", bad)));
        }
        Ok(Self {
            power,
            frames_averaged: 0,
        })
    }

    /// Average `|X|²` over the first `frames` frames of a spectrogram
    ///
    /// Typically the leading frames of a recording before speech starts.
    pub fn from_frames(spectrogram: &Spectrogram, frames: usize) -> Result<Self> {
        if frames == 0 {
            return Err(StftError::config("noise profile needs at least one frame"));
        }
        if frames > spectrogram.frame_count() {
            return Err(StftError::config(format!(
                "noise profile over {} frames, spectrogram has {}",
                frames,
                spectrogram.frame_count()
            )));
        }

        let mut power = vec![0.0; spectrogram.bin_count()];
        for row in spectrogram.frames().take(frames) {
            for (acc, bin) in power.iter_mut().zip(row.iter()) {
                *acc += bin.norm_sqr();
            }
        }
        for p in power.iter_mut() {
            *p /= frames as f64;
        }

        debug!(frames, bins = power.len(), "noise profile estimated");
        Ok(Self {
            power,
            frames_averaged: frames,
        })
    }

    /// Analyse a noise-only recording and average all of its frames
    pub fn from_signal(stft: &Stft, noise: &[f64]) -> Result<Self> {
        let spectrogram = stft.analyze(noise)?;
        Self::from_frames(&spectrogram, spectrogram.frame_count())
    }

    #[inline]
    pub fn power(&self) -> &[f64] {
        &self.power
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.power.len()
    }

    #[inline]
    pub fn frames_averaged(&self) -> usize {
        self.frames_averaged
    }

    /// Total noise power per frame in dB
    pub fn level_db(&self) -> f64 {
        power_to_db(self.power.iter().sum())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Gain rule applied per bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtractionMode {
    /// Square root of the power ratio
    #[default]
    PowerSubtraction,
    /// Power ratio without the square root
    Wiener,
}

/// Configuration for spectral subtraction
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralSubtractionConfig {
    /// Over-subtraction factor applied to the noise power
    pub alpha: f64,

    /// Lower bound on the gain
    pub beta: f64,

    pub mode: SubtractionMode,
}

impl Default for SpectralSubtractionConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            mode: SubtractionMode::default(),
        }
    }
}

impl SpectralSubtractionConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_ALPHA).contains(&self.alpha) {
            return Err(StftError::config(format!(
                "Alpha {} out of range [0, {}]",
                self.alpha, MAX_ALPHA
            )));
        }

        if !(0.0..=1.0).contains(&self.beta) {
            return Err(StftError::config(format!(
                "Beta {} out of range [0, 1]",
                self.beta
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics from one subtraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtractionStats {
    pub frames_processed: usize,

    /// Mean gain over all bins
    pub mean_gain: f64,

    /// Bins held at the floor
    pub floored_bins: usize,

    /// Output over input energy in dB; zero for a silent input
    pub energy_change_db: f64,
}

// ============================================================================
// Subtractor
// ============================================================================

/// Spectral subtractor with a fixed noise profile
#[derive(Debug, Clone)]
pub struct SpectralSubtractor {
    config: SpectralSubtractionConfig,
    noise: NoiseProfile,
}

impl SpectralSubtractor {
    pub fn new(config: SpectralSubtractionConfig, noise: NoiseProfile) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, noise })
    }

    pub fn builder() -> SpectralSubtractorBuilder {
        SpectralSubtractorBuilder::new()
    }

    #[inline]
    pub fn config(&self) -> &SpectralSubtractionConfig {
        &self.config
    }

    #[inline]
    pub fn noise_profile(&self) -> &NoiseProfile {
        &self.noise
    }

    #[inline]
    pub fn is_wiener_mode(&self) -> bool {
        self.config.mode == SubtractionMode::Wiener
    }

    /// Gain for one bin with observed power `power` and noise power `noise`
    pub fn gain(&self, power: f64, noise: f64) -> f64 {
        let residual = (power - self.config.alpha * noise).max(0.0);
        let ratio = if power > 0.0 { residual / power } else { 0.0 };
        let gain = match self.config.mode {
            SubtractionMode::PowerSubtraction => ratio.sqrt(),
            SubtractionMode::Wiener => ratio,
        };
        gain.clamp(self.config.beta, 1.0)
    }

    /// Gain mask with the shape of `spectrogram`
    pub fn gains(&self, spectrogram: &Spectrogram) -> Result<Vec<Vec<f64>>> {
        self.check_bins(spectrogram)?;
        Ok(spectrogram
            .frames()
            .map(|row| {
                row.iter()
                    .zip(self.noise.power.iter())
                    .map(|(y, &noise)| self.gain(y.norm_sqr(), noise))
                    .collect()
            })
            .collect())
    }

    /// Apply the gain mask in place
    pub fn apply(&self, spectrogram: &mut Spectrogram) -> Result<SubtractionStats> {
        let mask = self.gains(spectrogram)?;
        let energy_in: f64 = spectrogram.as_slice().iter().map(|c| c.norm_sqr()).sum();

        spectrogram.apply_mask(&mask)?;

        let energy_out: f64 = spectrogram.as_slice().iter().map(|c| c.norm_sqr()).sum();
        let bins = mask.iter().map(Vec::len).sum::<usize>();
        let gain_sum: f64 = mask.iter().flatten().sum();
        let floored_bins = mask.iter().flatten().filter(|&&g| g <= self.config.beta).count();

        let stats = SubtractionStats {
            frames_processed: mask.len(),
            mean_gain: if bins > 0 { gain_sum / bins as f64 } else { 0.0 },
            floored_bins,
            energy_change_db: if energy_in > 0.0 {
                power_to_db(energy_out) - power_to_db(energy_in)
            } else {
                0.0
            },
        };
        debug!(?stats, "spectral subtraction applied");
        Ok(stats)
    }

    fn check_bins(&self, spectrogram: &Spectrogram) -> Result<()> {
        if spectrogram.bin_count() != self.noise.bin_count() {
            return Err(StftError::ShapeMismatch {
                what: "noise profile bins",
                expected: self.noise.bin_count(),
                actual: spectrogram.bin_count(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Builder Pattern
// ============================================================================

/// Builder for SpectralSubtractor
#[derive(Debug, Clone, Default)]
pub struct SpectralSubtractorBuilder {
    config: SpectralSubtractionConfig,
}

impl SpectralSubtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set over-subtraction factor
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Set gain floor
    pub fn beta(mut self, beta: f64) -> Self {
        self.config.beta = beta;
        self
    }

    pub fn mode(mut self, mode: SubtractionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Enable Wiener filter mode
    pub fn wiener_mode(mut self, enabled: bool) -> Self {
        self.config.mode = if enabled {
            SubtractionMode::Wiener
        } else {
            SubtractionMode::PowerSubtraction
        };
        self
    }

    /// Build the spectral subtractor around a noise profile
    pub fn build(self, noise: NoiseProfile) -> Result<SpectralSubtractor> {
        SpectralSubtractor::new(self.config, noise)
    }
}

// ============================================================================
// Tests
// ============================================================================
