//! Dense complex spectrogram indexed by (frame, frequency bin)

use num_complex::Complex64;

use crate::error::{Result, StftError};
use crate::utils::power_to_db;

/// Complex half-spectra of consecutive frames, stored row-major
///
/// The layout parameters travel with the data so that the inverse
/// transform can verify it is being handed a compatible spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Vec<Complex64>,
    frame_count: usize,
    bin_count: usize,
    window_length: usize,
    fft_size: usize,
    hop: usize,
}

impl Spectrogram {
    /// Build from rows of `fft_size / 2 + 1` bins each
    pub fn from_frames(
        frames: Vec<Vec<Complex64>>,
        window_length: usize,
        fft_size: usize,
        hop: usize,
    ) -> Result<Self> {
        let bin_count = fft_size / 2 + 1;
        let frame_count = frames.len();
        let mut data = Vec::with_capacity(frame_count * bin_count);

        for row in frames {
            if row.len() != bin_count {
                return Err(StftError::ShapeMismatch {
                    what: "bin count",
                    expected: bin_count,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }

        Ok(Self {
            data,
            frame_count,
            bin_count,
            window_length,
            fft_size,
            hop,
        })
    }

    /// Spectrogram of zeros with the given layout
    pub fn zeros(frame_count: usize, window_length: usize, fft_size: usize, hop: usize) -> Self {
        let bin_count = fft_size / 2 + 1;
        Self {
            data: vec![Complex64::new(0.0, 0.0); frame_count * bin_count],
            frame_count,
            bin_count,
            window_length,
            fft_size,
            hop,
        }
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    #[inline]
    pub fn window_length(&self) -> usize {
        self.window_length
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Bins of frame `index`
    ///
    /// # Panics
    /// Panics if `index >= frame_count()`.
    pub fn frame(&self, index: usize) -> &[Complex64] {
        let start = index * self.bin_count;
        &self.data[start..start + self.bin_count]
    }

    /// Mutable bins of frame `index`
    ///
    /// # Panics
    /// Panics if `index >= frame_count()`.
    pub fn frame_mut(&mut self, index: usize) -> &mut [Complex64] {
        let start = index * self.bin_count;
        &mut self.data[start..start + self.bin_count]
    }

    pub fn get(&self, frame: usize, bin: usize) -> Option<Complex64> {
        if frame < self.frame_count && bin < self.bin_count {
            Some(self.data[frame * self.bin_count + bin])
        } else {
            None
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = &[Complex64]> {
        self.data.chunks_exact(self.bin_count.max(1))
    }

    pub fn frames_mut(&mut self) -> impl Iterator<Item = &mut [Complex64]> {
        self.data.chunks_exact_mut(self.bin_count.max(1))
    }

    /// Flat row-major view of all bins
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    // ========================================================================
    // Read-outs
    // ========================================================================

    /// `|X|` per frame, row-major
    pub fn magnitude(&self) -> Vec<Vec<f64>> {
        self.frames().map(|row| row.iter().map(|c| c.norm()).collect()).collect()
    }

    /// `|X|²` per frame, row-major
    pub fn power(&self) -> Vec<Vec<f64>> {
        self.frames().map(|row| row.iter().map(|c| c.norm_sqr()).collect()).collect()
    }

    /// `10·log10(|X|²)` clamped from below at `floor_db`, for heat-map display
    pub fn log_magnitude_db(&self, floor_db: f64) -> Vec<Vec<f64>> {
        self.frames()
            .map(|row| row.iter().map(|c| power_to_db(c.norm_sqr()).max(floor_db)).collect())
            .collect()
    }

    /// Centre frequency in Hz of every bin
    pub fn frequencies(&self, sample_rate: u32) -> Vec<f64> {
        let resolution = sample_rate as f64 / self.fft_size as f64;
        (0..self.bin_count).map(|k| k as f64 * resolution).collect()
    }

    /// Start time in seconds of every frame
    pub fn frame_times(&self, sample_rate: u32) -> Vec<f64> {
        (0..self.frame_count)
            .map(|k| (k * self.hop) as f64 / sample_rate as f64)
            .collect()
    }

    // ========================================================================
    // Modification
    // ========================================================================

    /// Multiply every bin of frame `index` by `gain`
    pub fn scale_frame(&mut self, index: usize, gain: f64) -> Result<()> {
        if index >= self.frame_count {
            return Err(StftError::ShapeMismatch {
                what: "frame index",
                expected: self.frame_count,
                actual: index + 1,
            });
        }
        for bin in self.frame_mut(index) {
            *bin *= gain;
        }
        Ok(())
    }

    /// Multiply each frame by its own gain; `gains.len()` must equal the
    /// frame count
    pub fn apply_frame_gains(&mut self, gains: &[f64]) -> Result<()> {
        if gains.len() != self.frame_count {
            return Err(StftError::ShapeMismatch {
                what: "frame gains",
                expected: self.frame_count,
                actual: gains.len(),
            });
        }
        for (row, &gain) in self.frames_mut().zip(gains.iter()) {
            for bin in row {
                *bin *= gain;
            }
        }
        Ok(())
    }

    /// Multiply bin-by-bin with a real mask of identical shape
    pub fn apply_mask(&mut self, mask: &[Vec<f64>]) -> Result<()> {
        if mask.len() != self.frame_count {
            return Err(StftError::ShapeMismatch {
                what: "mask frames",
                expected: self.frame_count,
                actual: mask.len(),
            });
        }
        if let Some(bad) = mask.iter().find(|gains| gains.len() != self.bin_count) {
            return Err(StftError::ShapeMismatch {
                what: "mask bins",
                expected: self.bin_count,
                actual: bad.len(),
            });
        }
        for (row, gains) in self.frames_mut().zip(mask.iter()) {
            for (bin, &gain) in row.iter_mut().zip(gains.iter()) {
                *bin *= gain;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
