//! Per-frame real Fourier transform with conjugate-symmetric compaction
//!
//! The forward transform is unnormalised and the inverse carries the `1/N`
//! factor, so an impulse maps to a flat, all-ones half-spectrum and
//! `from_spectrum(to_spectrum(x), N) == x`.

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StftError};

/// Number of non-negative frequency bins for a transform of `size` samples
#[inline]
pub fn bin_count(size: usize) -> usize {
    size / 2 + 1
}

// ============================================================================
// Frame Transform
// ============================================================================

/// Planned forward/inverse transform for frames of a fixed size
///
/// Plans are shared through `Arc`, so one transform can be used from
/// several threads; every call works on its own buffer.
#[derive(Clone)]
pub struct FrameTransform {
    size: usize,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for FrameTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTransform").field("size", &self.size).finish()
    }
}

impl FrameTransform {
    /// Plan transforms of `size` samples
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(StftError::config("transform size must be positive"));
        }

        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        debug!(size, "planned frame transform");

        Ok(Self {
            size,
            fft_forward,
            fft_inverse,
        })
    }

    /// Transform size in samples
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of half-spectrum bins produced by [`to_spectrum`](Self::to_spectrum)
    #[inline]
    pub fn bin_count(&self) -> usize {
        bin_count(self.size)
    }

    /// Half-spectrum of `frame`, bins `0..=size/2`
    ///
    /// Frames shorter than the transform size are zero-filled at the end.
    pub fn to_spectrum(&self, frame: &[f64]) -> Result<Vec<Complex64>> {
        if frame.len() > self.size {
            return Err(StftError::ShapeMismatch {
                what: "frame length",
                expected: self.size,
                actual: frame.len(),
            });
        }

        let mut buffer = vec![Complex64::new(0.0, 0.0); self.size];
        for (slot, &sample) in buffer.iter_mut().zip(frame.iter()) {
            *slot = Complex64::new(sample, 0.0);
        }

        self.fft_forward.process(&mut buffer);
        buffer.truncate(self.bin_count());
        Ok(buffer)
    }

    /// Real sequence of `n` samples whose half-spectrum is `spectrum`
    ///
    /// The negative-frequency half is rebuilt by conjugate symmetry.
    /// Imaginary parts at DC and (for even `n`) Nyquist cannot be
    /// represented by a real sequence and are dropped.
    pub fn from_spectrum(&self, spectrum: &[Complex64], n: usize) -> Result<Vec<f64>> {
        if n != self.size {
            return Err(StftError::ShapeMismatch {
                what: "output length",
                expected: self.size,
                actual: n,
            });
        }
        if spectrum.len() != self.bin_count() {
            return Err(StftError::ShapeMismatch {
                what: "bin count",
                expected: self.bin_count(),
                actual: spectrum.len(),
            });
        }

        let mut buffer = vec![Complex64::new(0.0, 0.0); n];
        buffer[..spectrum.len()].copy_from_slice(spectrum);
        for k in spectrum.len()..n {
            buffer[k] = spectrum[n - k].conj();
        }

        self.fft_inverse.process(&mut buffer);

        let scale = 1.0 / n as f64;
        Ok(buffer.iter().map(|c| c.re * scale).collect())
    }
}

// ============================================================================
// One-off Helpers
// ============================================================================

/// Half-spectrum of `frame` using a transform of the frame's own length
pub fn to_spectrum(frame: &[f64]) -> Result<Vec<Complex64>> {
    FrameTransform::new(frame.len())?.to_spectrum(frame)
}

/// Inverse of [`to_spectrum`] for a real sequence of `n` samples
pub fn from_spectrum(spectrum: &[Complex64], n: usize) -> Result<Vec<f64>> {
    FrameTransform::new(n)?.from_spectrum(spectrum, n)
}

/// Magnitude of every bin
pub fn magnitude_spectrum(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| c.norm()).collect()
}

/// Phase of every bin in radians
pub fn phase_spectrum(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| c.arg()).collect()
}

/// Rebuild complex bins from magnitudes and phases
pub fn from_magnitude_phase(magnitudes: &[f64], phases: &[f64]) -> Vec<Complex64> {
    magnitudes
        .iter()
        .zip(phases.iter())
        .map(|(&mag, &phase)| Complex64::from_polar(mag, phase))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
