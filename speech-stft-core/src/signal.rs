//! Sample sequences with their sample rate, and seeded test-signal
//! generators
//!
//! Generators never touch a process-wide random source: the caller hands in
//! the `Rng`, so tests and demos stay reproducible.

use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

use crate::error::{Result, StftError};

// ============================================================================
// Signal
// ============================================================================

/// Real-valued samples at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl Signal {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(StftError::config("sample rate must be positive"));
        }
        Ok(Self { samples, sample_rate })
    }

    #[inline]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sum of squared samples
    pub fn energy(&self) -> f64 {
        self.samples.iter().map(|x| x * x).sum()
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

impl AsRef<[f64]> for Signal {
    fn as_ref(&self) -> &[f64] {
        &self.samples
    }
}

/// Milliseconds to a whole number of samples, rounding down
#[inline]
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms * sample_rate as f64 / 1000.0).floor().max(0.0) as usize
}

// ============================================================================
// Generators
// ============================================================================

/// Hann-modulated sine burst with a random initial phase
///
/// `duration_s · sample_rate` samples of `amplitude · sin(2π f0 t + φ)`,
/// with `φ` drawn uniformly from `[0, 2π)` and the burst shaped by a
/// symmetric Hann window that is exactly zero at both ends.
pub fn narrowband_pulse<R: Rng + ?Sized>(
    amplitude: f64,
    duration_s: f64,
    f0: f64,
    sample_rate: u32,
    rng: &mut R,
) -> Vec<f64> {
    let length = (duration_s * sample_rate as f64).max(0.0) as usize;
    let phase = rng.gen_range(0.0..2.0 * PI);
    let dt = 1.0 / sample_rate as f64;

    (0..length)
        .map(|n| {
            let envelope = if length > 1 {
                0.5 - 0.5 * (2.0 * PI * n as f64 / (length - 1) as f64).cos()
            } else {
                1.0
            };
            amplitude * (2.0 * PI * f0 * n as f64 * dt + phase).sin() * envelope
        })
        .collect()
}

/// Zero-mean Gaussian noise with standard deviation `std_dev`
pub fn white_noise<R: Rng + ?Sized>(length: usize, std_dev: f64, rng: &mut R) -> Vec<f64> {
    (0..length)
        .map(|_| rng.sample::<f64, _>(StandardNormal) * std_dev)
        .collect()
}

/// Add white noise whose variance sits `snr_db` below the signal variance
pub fn add_noise_at_snr<R: Rng + ?Sized>(signal: &[f64], snr_db: f64, rng: &mut R) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    let variance = signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / signal.len() as f64;
    let noise_std = (variance / 10f64.powf(snr_db / 10.0)).sqrt();

    signal
        .iter()
        .zip(white_noise(signal.len(), noise_std, rng))
        .map(|(s, n)| s + n)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
