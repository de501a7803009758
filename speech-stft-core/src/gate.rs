//! Frame-energy noise gate operating on a spectrogram
//!
//! A frame is considered speech when its energy exceeds the mean frame
//! energy (in dB) by a fixed offset. The raw decision is then held open
//! for a hysteresis period after the last active frame, and the resulting
//! 0/1 gate is softened into fade-in and fade-out ramps by averaging it
//! over a trailing window of frames.
//!
//! All time constants are converted to frame counts with the frame step,
//! truncating towards zero.

use tracing::debug;

use crate::error::{Result, StftError};
use crate::spectrogram::Spectrogram;
use crate::utils::{finite_mean, power_to_db};

/// Default values for energy gate parameters
pub mod defaults {
    pub const THRESHOLD_OFFSET_DB: f64 = 3.0;
    pub const HYSTERESIS_MS: f64 = 300.0;
    pub const FADE_IN_MS: f64 = 50.0;
    pub const FADE_OUT_MS: f64 = 300.0;
    pub const FRAME_STEP_MS: f64 = 15.0;
}

/// Per-frame gate state derived from the activity decision and the gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Gain is zero
    Closed,
    /// Active, gain still ramping up
    Opening,
    /// Gain is one
    Open,
    /// Inactive, gain ramping down
    Closing,
}

/// Configuration for the energy gate
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGateConfig {
    /// Threshold above the mean frame energy, in dB
    pub threshold_offset_db: f64,

    /// How long the gate stays open after the last active frame
    pub hysteresis_ms: f64,

    /// Length of the opening ramp
    pub fade_in_ms: f64,

    /// Length of the closing ramp
    pub fade_out_ms: f64,

    /// Hop of the spectrogram the gate runs on
    pub frame_step_ms: f64,
}

impl Default for EnergyGateConfig {
    fn default() -> Self {
        Self {
            threshold_offset_db: defaults::THRESHOLD_OFFSET_DB,
            hysteresis_ms: defaults::HYSTERESIS_MS,
            fade_in_ms: defaults::FADE_IN_MS,
            fade_out_ms: defaults::FADE_OUT_MS,
            frame_step_ms: defaults::FRAME_STEP_MS,
        }
    }
}

impl EnergyGateConfig {
    /// Create config for a specific frame step
    pub fn with_frame_step_ms(frame_step_ms: f64) -> Self {
        Self {
            frame_step_ms,
            ..Default::default()
        }
    }

    /// Builder method for the threshold offset
    pub fn with_threshold_offset_db(mut self, offset_db: f64) -> Self {
        self.threshold_offset_db = offset_db;
        self
    }

    /// Builder method for the hysteresis time
    pub fn with_hysteresis_ms(mut self, hysteresis_ms: f64) -> Self {
        self.hysteresis_ms = hysteresis_ms;
        self
    }

    /// Builder method for the fade times
    pub fn with_fades(mut self, fade_in_ms: f64, fade_out_ms: f64) -> Self {
        self.fade_in_ms = fade_in_ms;
        self.fade_out_ms = fade_out_ms;
        self
    }

    pub fn hysteresis_frames(&self) -> usize {
        self.to_frames(self.hysteresis_ms)
    }

    pub fn fade_in_frames(&self) -> usize {
        self.to_frames(self.fade_in_ms)
    }

    pub fn fade_out_frames(&self) -> usize {
        self.to_frames(self.fade_out_ms)
    }

    fn to_frames(&self, ms: f64) -> usize {
        (ms / self.frame_step_ms).floor() as usize
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_step_ms.is_finite() && self.frame_step_ms > 0.0) {
            return Err(StftError::config("frame step must be positive"));
        }

        if !self.threshold_offset_db.is_finite() {
            return Err(StftError::config("threshold offset must be finite"));
        }

        for (name, value) in [
            ("hysteresis", self.hysteresis_ms),
            ("fade-in", self.fade_in_ms),
            ("fade-out", self.fade_out_ms),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(StftError::config(format!(
                    "{} time {} ms must be non-negative",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Summary of one gating pass
#[derive(Debug, Clone, PartialEq)]
pub struct GateStats {
    pub total_frames: usize,
    /// Frames above threshold before hysteresis
    pub active_frames: usize,
    pub open_frames: usize,
    pub opening_frames: usize,
    pub closing_frames: usize,
    pub closed_frames: usize,
    /// `None` when every frame is silent
    pub threshold_db: Option<f64>,
}

/// Energy gate over spectrogram frames
#[derive(Debug, Clone)]
pub struct EnergyGate {
    config: EnergyGateConfig,
}

impl EnergyGate {
    pub fn new(config: EnergyGateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &EnergyGateConfig {
        &self.config
    }

    /// Mean finite frame energy plus the offset
    ///
    /// Silent frames (`-inf` dB) are left out of the mean; with no finite
    /// frame there is no threshold and nothing is active.
    pub fn threshold_db(&self, spectrogram: &Spectrogram) -> Option<f64> {
        finite_mean(&frame_energy_db(spectrogram)).map(|mean| mean + self.config.threshold_offset_db)
    }

    /// Raw per-frame decision, without hysteresis
    pub fn activity(&self, spectrogram: &Spectrogram) -> Vec<bool> {
        let energies = frame_energy_db(spectrogram);
        match finite_mean(&energies) {
            Some(mean) => {
                let threshold = mean + self.config.threshold_offset_db;
                debug!(frames = energies.len(), threshold_db = threshold, "energy gate threshold");
                energies.iter().map(|&e| e > threshold).collect()
            }
            None => vec![false; energies.len()],
        }
    }

    /// Activity after hysteresis
    pub fn held_activity(&self, spectrogram: &Spectrogram) -> Vec<bool> {
        hysteresis(&self.activity(spectrogram), self.config.hysteresis_frames())
    }

    /// Per-frame gains in `[0, 1]`
    pub fn gains(&self, spectrogram: &Spectrogram) -> Vec<f64> {
        fade_gains(
            &self.held_activity(spectrogram),
            self.config.fade_in_frames(),
            self.config.fade_out_frames(),
        )
    }

    /// Scale each frame of `spectrogram` by its gate gain
    pub fn apply(&self, spectrogram: &mut Spectrogram) -> Result<()> {
        let gains = self.gains(spectrogram);
        spectrogram.apply_frame_gains(&gains)
    }

    /// Per-frame state of the gate
    pub fn states(&self, spectrogram: &Spectrogram) -> Vec<GateState> {
        let held = self.held_activity(spectrogram);
        let gains = fade_gains(&held, self.config.fade_in_frames(), self.config.fade_out_frames());
        classify(&held, &gains)
    }

    pub fn stats(&self, spectrogram: &Spectrogram) -> GateStats {
        let raw = self.activity(spectrogram);
        let states = self.states(spectrogram);
        let count = |state: GateState| states.iter().filter(|&&s| s == state).count();

        GateStats {
            total_frames: states.len(),
            active_frames: raw.iter().filter(|&&a| a).count(),
            open_frames: count(GateState::Open),
            opening_frames: count(GateState::Opening),
            closing_frames: count(GateState::Closing),
            closed_frames: count(GateState::Closed),
            threshold_db: self.threshold_db(spectrogram),
        }
    }
}

// ============================================================================
// Frame-level building blocks
// ============================================================================

/// `10·log10(Σ|X|²)` per frame; `-inf` for an all-zero frame
pub fn frame_energy_db(spectrogram: &Spectrogram) -> Vec<f64> {
    spectrogram
        .frames()
        .map(|row| power_to_db(row.iter().map(|c| c.norm_sqr()).sum()))
        .collect()
}

/// A frame is held active if it or any of the previous `frames` frames
/// is active
pub fn hysteresis(activity: &[bool], frames: usize) -> Vec<bool> {
    let mut last_active: Option<usize> = None;
    activity
        .iter()
        .enumerate()
        .map(|(i, &active)| {
            if active {
                last_active = Some(i);
            }
            last_active.map_or(false, |j| i - j <= frames)
        })
        .collect()
}

/// Mean of the trailing window ending at each frame
///
/// The window spans `fade_in + 1` frames where the gate is active and
/// `fade_out + 1` frames where it is not, truncated at the first frame.
pub fn fade_gains(active: &[bool], fade_in: usize, fade_out: usize) -> Vec<f64> {
    // prefix[i] = number of active frames in 0..i
    let mut prefix = Vec::with_capacity(active.len() + 1);
    prefix.push(0usize);
    for &a in active {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + a as usize);
    }

    active
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            let span = if a { fade_in } else { fade_out };
            let start = i.saturating_sub(span);
            (prefix[i + 1] - prefix[start]) as f64 / (i + 1 - start) as f64
        })
        .collect()
}

fn classify(active: &[bool], gains: &[f64]) -> Vec<GateState> {
    active
        .iter()
        .zip(gains.iter())
        .map(|(&a, &g)| {
            if g >= 1.0 {
                GateState::Open
            } else if g <= 0.0 {
                GateState::Closed
            } else if a {
                GateState::Opening
            } else {
                GateState::Closing
            }
        })
        .collect()
}
