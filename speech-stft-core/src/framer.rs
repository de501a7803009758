//! Framing of a continuous signal into overlapping windows, and the inverse
//! overlap-add fold
//!
//! Both directions are independent of any spectral transform so that purely
//! time-domain processing can reuse the same frame layout.

use tracing::trace;

use crate::error::{Result, StftError};

// ============================================================================
// Frame Grid
// ============================================================================

/// Frame layout derived from signal length, window length and hop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGrid {
    signal_length: usize,
    window_length: usize,
    hop: usize,
}

impl FrameGrid {
    /// Validate the parameters and build the grid
    pub fn new(signal_length: usize, window_length: usize, hop: usize) -> Result<Self> {
        if window_length == 0 {
            return Err(StftError::config("window length must be positive"));
        }
        if hop == 0 {
            return Err(StftError::config("hop must be positive"));
        }
        if hop > window_length {
            return Err(StftError::config(format!(
                "hop {} exceeds window length {}, frames would leave gaps",
                hop, window_length
            )));
        }
        if signal_length < window_length {
            return Err(StftError::InsufficientSamples {
                needed: window_length,
                available: signal_length,
            });
        }

        Ok(Self {
            signal_length,
            window_length,
            hop,
        })
    }

    /// `floor((signal_length - window_length) / hop) + 1`
    #[inline]
    pub fn frame_count(&self) -> usize {
        (self.signal_length - self.window_length) / self.hop + 1
    }

    /// First sample of frame `index`
    #[inline]
    pub fn offset(&self, index: usize) -> usize {
        index * self.hop
    }

    /// Length of the overlap-added output, `(frame_count - 1)·hop + window_length`
    #[inline]
    pub fn output_length(&self) -> usize {
        folded_length(self.frame_count(), self.window_length, self.hop)
    }

    #[inline]
    pub fn window_length(&self) -> usize {
        self.window_length
    }

    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[inline]
    pub fn signal_length(&self) -> usize {
        self.signal_length
    }

    /// Samples at the end of the signal not covered by any frame
    #[inline]
    pub fn trailing_samples(&self) -> usize {
        self.signal_length - self.output_length()
    }
}

#[inline]
fn folded_length(frame_count: usize, window_length: usize, hop: usize) -> usize {
    if frame_count == 0 {
        0
    } else {
        (frame_count - 1) * hop + window_length
    }
}

// ============================================================================
// Cut
// ============================================================================

/// Slice `signal` into overlapping frames `signal[k·hop .. k·hop + window_length]`
pub fn cut(signal: &[f64], window_length: usize, hop: usize) -> Result<Vec<&[f64]>> {
    let grid = FrameGrid::new(signal.len(), window_length, hop)?;
    trace!(
        frames = grid.frame_count(),
        window_length,
        hop,
        "cutting signal into frames"
    );

    Ok((0..grid.frame_count())
        .map(|k| {
            let start = grid.offset(k);
            &signal[start..start + window_length]
        })
        .collect())
}

// ============================================================================
// Overlap-Add Accumulator
// ============================================================================

/// Zero-initialised output buffer that frames are summed into
///
/// Every region is touched by at most `ceil(window_length / hop)` frames.
/// Addition order does not matter; the result is a plain sum.
#[derive(Debug, Clone)]
pub struct OverlapAdd {
    buffer: Vec<f64>,
    window_length: usize,
    hop: usize,
}

impl OverlapAdd {
    /// Accumulator sized for `frame_count` frames
    pub fn new(frame_count: usize, window_length: usize, hop: usize) -> Result<Self> {
        if window_length == 0 || hop == 0 {
            return Err(StftError::config("window length and hop must be positive"));
        }

        Ok(Self {
            buffer: vec![0.0; folded_length(frame_count, window_length, hop)],
            window_length,
            hop,
        })
    }

    /// Add `frame` at offset `index·hop`
    pub fn add(&mut self, index: usize, frame: &[f64]) -> Result<()> {
        if frame.len() != self.window_length {
            return Err(StftError::ShapeMismatch {
                what: "frame length",
                expected: self.window_length,
                actual: frame.len(),
            });
        }

        let start = index * self.hop;
        let end = start + self.window_length;
        if end > self.buffer.len() {
            return Err(StftError::ShapeMismatch {
                what: "frame index",
                expected: self.frame_capacity(),
                actual: index + 1,
            });
        }

        for (acc, &sample) in self.buffer[start..end].iter_mut().zip(frame.iter()) {
            *acc += sample;
        }

        Ok(())
    }

    /// Number of frames the buffer was sized for
    pub fn frame_capacity(&self) -> usize {
        if self.buffer.is_empty() {
            0
        } else {
            (self.buffer.len() - self.window_length) / self.hop + 1
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Hand the accumulated samples back as the output signal
    pub fn into_signal(self) -> Vec<f64> {
        self.buffer
    }
}

// ============================================================================
// Fold
// ============================================================================

/// Overlap-add equal-length frames at offsets `k·hop`
///
/// The frames are expected to carry their synthesis window already. Empty
/// input yields an empty signal; frames of differing lengths are a
/// [`StftError::ShapeMismatch`].
pub fn fold<F: AsRef<[f64]>>(frames: &[F], hop: usize) -> Result<Vec<f64>> {
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };

    let window_length = first.as_ref().len();
    if window_length == 0 {
        return Ok(Vec::new());
    }

    let mut accumulator = OverlapAdd::new(frames.len(), window_length, hop)?;
    for (k, frame) in frames.iter().enumerate() {
        accumulator.add(k, frame.as_ref())?;
    }

    trace!(frames = frames.len(), output = accumulator.len(), "folded frames");
    Ok(accumulator.into_signal())
}

// ============================================================================
// Tests
// ============================================================================
