//! Sub-sample time shifting by frequency-domain phase rotation
//!
//! The whole signal is transformed at once (no framing), so it is treated
//! as one period of a periodic signal: a delay is a circular shift with
//! band-limited interpolation. Delays that are large compared with the
//! signal wrap around; callers that need a linear delay zero-pad first.

use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::trace;

use crate::error::{Result, StftError};
use crate::spectrum::FrameTransform;

/// Delay `signal` by `t0` seconds (negative values advance it)
///
/// Bin `k` is rotated by `exp(-i·2π·f_k·t0)` with `f_k = k·sample_rate/N`.
/// For even `N` the Nyquist bin must stay real, so it is multiplied by the
/// sign of `cos(π·d)`, `d = t0·sample_rate`, instead: exact for whole-sample shifts, and a delay
/// followed by the matching advance is the identity.
pub fn delay(signal: &[f64], t0: f64, sample_rate: u32) -> Result<Vec<f64>> {
    if sample_rate == 0 {
        return Err(StftError::config("sample rate must be positive"));
    }
    if !t0.is_finite() {
        return Err(StftError::config(format!("delay {} is not finite", t0)));
    }

    delay_samples(signal, t0 * sample_rate as f64)
}

/// Delay `signal` by a possibly fractional number of samples
pub fn delay_samples(signal: &[f64], samples: f64) -> Result<Vec<f64>> {
    if !samples.is_finite() {
        return Err(StftError::config(format!("delay {} is not finite", samples)));
    }

    let n = signal.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    trace!(length = n, samples, "fractional delay");

    let transform = FrameTransform::new(n)?;
    let mut spectrum = transform.to_spectrum(signal)?;

    // f_k·t0 = (k·fs/N)·(d/fs) = k·d/N
    let step = -2.0 * PI * samples / n as f64;
    // Nyquist must stay real; a phase rotation there would be discarded
    let nyquist = (n % 2 == 0).then_some(n / 2);
    let nyquist_sign = (PI * samples).cos().signum();

    for (k, bin) in spectrum.iter_mut().enumerate() {
        if Some(k) == nyquist {
            *bin *= nyquist_sign;
        } else {
            *bin *= Complex64::from_polar(1.0, step * k as f64);
        }
    }

    transform.from_spectrum(&spectrum, n)
}
