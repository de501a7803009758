//! Time-difference-of-arrival estimation with GCC-PHAT
//!
//! The cross-spectrum of two spectrograms is averaged over frames, whitened
//! to unit magnitude (phase transform) and transformed back. The peak of
//! the resulting correlation sits at the lag of the second signal relative
//! to the first. Lags are only meaningful well inside one window.

use num_complex::Complex64;
use tracing::debug;

use crate::error::{Result, StftError};
use crate::spectrogram::Spectrogram;
use crate::spectrum::FrameTransform;

/// Frame-mean of `conj(A)·B`, one value per bin
pub fn cross_spectrum(a: &Spectrogram, b: &Spectrogram) -> Result<Vec<Complex64>> {
    check_pair(a, b)?;

    let mut acc = vec![Complex64::new(0.0, 0.0); a.bin_count()];
    for (row_a, row_b) in a.frames().zip(b.frames()) {
        for ((sum, x1), x2) in acc.iter_mut().zip(row_a.iter()).zip(row_b.iter()) {
            *sum += x1.conj() * x2;
        }
    }

    let frames = a.frame_count() as f64;
    for sum in acc.iter_mut() {
        *sum /= frames;
    }
    Ok(acc)
}

/// Generalised cross-correlation with phase transform
///
/// Returns `fft_size` correlation values; index `k` is lag `k` and the
/// upper half holds the negative lags. Bins where the cross-spectrum
/// vanishes contribute nothing.
pub fn gcc_phat(a: &Spectrogram, b: &Spectrogram) -> Result<Vec<f64>> {
    let whitened: Vec<Complex64> = cross_spectrum(a, b)?
        .into_iter()
        .map(|c| {
            let magnitude = c.norm();
            if magnitude > 0.0 {
                c / magnitude
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect();

    let n = a.fft_size();
    FrameTransform::new(n)?.from_spectrum(&whitened, n)
}

/// Lag in samples of `b` relative to `a`; positive when `b` arrives later
pub fn estimate_delay(a: &Spectrogram, b: &Spectrogram) -> Result<isize> {
    let correlation = gcc_phat(a, b)?;
    let n = correlation.len();

    let (peak, value) = correlation
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (i, &v)| {
            if v > best_value {
                (i, v)
            } else {
                (best, best_value)
            }
        });

    let lag = if peak > n / 2 {
        peak as isize - n as isize
    } else {
        peak as isize
    };
    debug!(lag, peak = value, "gcc-phat delay estimate");
    Ok(lag)
}

fn check_pair(a: &Spectrogram, b: &Spectrogram) -> Result<()> {
    if a.bin_count() != b.bin_count() {
        return Err(StftError::ShapeMismatch {
            what: "bin count",
            expected: a.bin_count(),
            actual: b.bin_count(),
        });
    }
    if a.frame_count() != b.frame_count() {
        return Err(StftError::ShapeMismatch {
            what: "frame count",
            expected: a.frame_count(),
            actual: b.frame_count(),
        });
    }
    if a.is_empty() {
        return Err(StftError::config("cross-spectrum needs at least one frame"));
    }
    Ok(())
}
