//! Windowing functions and the overlap-add reconstruction laws
//!
//! Two reconstruction laws are kept strictly apart:
//! - analysis-only: the analysis window itself must sum to one over the
//!   overlaps, and synthesis is a plain (rectangular) overlap-add. Hann at
//!   50% overlap is the usual choice, mostly for visualization.
//! - analysis+synthesis: the same window is applied before the transform
//!   and after the inverse, so the *squared* window must sum to one
//!   (Princen-Bradley). The half-sine window satisfies this at 50% overlap
//!   and keeps the output continuous with uniform noise energy when the
//!   spectrum is modified.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, StftError};

// ============================================================================
// Window Shapes
// ============================================================================

/// Supported window shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowShape {
    /// `sin(π(n+0.5)/L)`, the square root of a Hann window
    HalfSine,
    /// `sin²(π(n+0.5)/L)`, sums to one at 50% overlap
    Hann,
    /// All ones; no tapering at the frame borders
    Rectangular,
}

impl WindowShape {
    /// Generate window coefficients for the given length
    pub fn generate(&self, length: usize) -> Vec<f64> {
        let mut window = vec![0.0; length];
        self.generate_into(&mut window);
        window
    }

    /// Generate window coefficients into an existing buffer
    pub fn generate_into(&self, window: &mut [f64]) {
        match self {
            WindowShape::HalfSine => half_sine_window_into(window),
            WindowShape::Hann => hann_window_into(window),
            WindowShape::Rectangular => window.fill(1.0),
        }
    }

    /// Reconstruction law this shape is designed for at 50% overlap
    pub fn natural_law(&self) -> ReconstructionLaw {
        match self {
            WindowShape::HalfSine => ReconstructionLaw::AnalysisSynthesis,
            WindowShape::Hann | WindowShape::Rectangular => ReconstructionLaw::AnalysisOnly,
        }
    }
}

impl std::fmt::Display for WindowShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowShape::HalfSine => write!(f, "half-sine"),
            WindowShape::Hann => write!(f, "hann"),
            WindowShape::Rectangular => write!(f, "rectangular"),
        }
    }
}

/// Which product of windows must sum to one over the overlaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconstructionLaw {
    /// Window applied on analysis only; `Σ w = 1`
    AnalysisOnly,
    /// Same window on analysis and synthesis; `Σ w² = 1`
    AnalysisSynthesis,
}

// ============================================================================
// Window Functions Implementation
// ============================================================================

/// Half-sample offset keeps the window symmetric and strictly positive on
/// every sample while still tending to zero at both borders.
fn half_sine_window_into(window: &mut [f64]) {
    let length = window.len() as f64;
    for (n, w) in window.iter_mut().enumerate() {
        *w = (PI * (n as f64 + 0.5) / length).sin();
    }
}

fn hann_window_into(window: &mut [f64]) {
    let length = window.len() as f64;
    for (n, w) in window.iter_mut().enumerate() {
        let s = (PI * (n as f64 + 0.5) / length).sin();
        *w = s * s;
    }
}

/// Multiply a frame by a window in place
#[inline]
pub fn apply_window(frame: &mut [f64], window: &[f64]) -> Result<()> {
    if frame.len() != window.len() {
        return Err(StftError::ShapeMismatch {
            what: "window length",
            expected: window.len(),
            actual: frame.len(),
        });
    }

    for (s, w) in frame.iter_mut().zip(window.iter()) {
        *s *= w;
    }

    Ok(())
}

// ============================================================================
// Window Specification
// ============================================================================

/// Length, shape and reconstruction law of an analysis/synthesis window pair
///
/// There is deliberately no `Default`: every call site states all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    length: usize,
    shape: WindowShape,
    law: ReconstructionLaw,
}

impl WindowSpec {
    /// Create a validated window specification
    pub fn new(length: usize, shape: WindowShape, law: ReconstructionLaw) -> Result<Self> {
        if length == 0 {
            return Err(StftError::config("window length must be positive"));
        }

        if law == ReconstructionLaw::AnalysisSynthesis && length % 2 != 0 {
            return Err(StftError::config(format!(
                "window length {} must be even for analysis+synthesis windowing",
                length
            )));
        }

        let spec = Self { length, shape, law };

        let total: f64 = spec.shape.generate(length).iter().map(|w| w.abs()).sum();
        if total <= f64::EPSILON {
            return Err(StftError::config(format!("{} window of length {} is all zero", shape, length)));
        }

        Ok(spec)
    }

    /// Half-sine window used on both analysis and synthesis
    pub fn half_sine(length: usize) -> Result<Self> {
        Self::new(length, WindowShape::HalfSine, ReconstructionLaw::AnalysisSynthesis)
    }

    /// Hann window used on analysis only
    pub fn hann(length: usize) -> Result<Self> {
        Self::new(length, WindowShape::Hann, ReconstructionLaw::AnalysisOnly)
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn shape(&self) -> WindowShape {
        self.shape
    }

    #[inline]
    pub fn law(&self) -> ReconstructionLaw {
        self.law
    }

    /// Window applied to each frame before the forward transform
    pub fn analysis_window(&self) -> Vec<f64> {
        self.shape.generate(self.length)
    }

    /// Window applied to each frame after the inverse transform
    pub fn synthesis_window(&self) -> Vec<f64> {
        match self.law {
            ReconstructionLaw::AnalysisSynthesis => self.shape.generate(self.length),
            ReconstructionLaw::AnalysisOnly => vec![1.0; self.length],
        }
    }

    /// Check that `hop` leaves no gaps between frames
    pub fn validate_hop(&self, hop: usize) -> Result<()> {
        if hop == 0 {
            return Err(StftError::config("hop must be positive"));
        }
        if hop > self.length {
            return Err(StftError::config(format!(
                "hop {} exceeds window length {}",
                hop, self.length
            )));
        }
        Ok(())
    }

    /// Largest deviation from one of the steady-state overlap-add sum
    /// `Σ_k w_a[n - k·hop]·w_s[n - k·hop]`
    pub fn reconstruction_error(&self, hop: usize) -> Result<f64> {
        self.validate_hop(hop)?;
        let sums = overlap_sum(&self.analysis_window(), &self.synthesis_window(), hop);
        Ok(sums.iter().map(|s| (s - 1.0).abs()).fold(0.0, f64::max))
    }

    /// `w[n]² + w[n + L/2]² == 1` for every `n` in the first half
    pub fn satisfies_princen_bradley(&self, tolerance: f64) -> bool {
        if self.length % 2 != 0 {
            return false;
        }
        let window = self.analysis_window();
        let half = self.length / 2;
        (0..half).all(|n| (window[n] * window[n] + window[n + half] * window[n + half] - 1.0).abs() <= tolerance)
    }
}

/// Steady-state overlap-add gain at each position of one hop period
///
/// Element `n` is `Σ_j analysis[n + j·hop]·synthesis[n + j·hop]`, i.e. the
/// weight a sample receives once every overlapping frame has been added.
pub fn overlap_sum(analysis: &[f64], synthesis: &[f64], hop: usize) -> Vec<f64> {
    let size = analysis.len().min(synthesis.len());
    let period = hop.min(size);

    (0..period)
        .map(|offset| {
            (offset..size)
                .step_by(hop.max(1))
                .map(|n| analysis[n] * synthesis[n])
                .sum()
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
