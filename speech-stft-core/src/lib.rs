//! STFT analysis and overlap-add synthesis core for speech processing
//!
//! This library provides windowed short-time Fourier analysis with
//! perfect-reconstruction synthesis, a spectrogram type that processing
//! stages modify in place, and a few such stages: frame-energy gating,
//! spectral subtraction, fractional delay and GCC-PHAT delay estimation.
//! A WebAssembly facade exposes the common round trips.

use wasm_bindgen::prelude::*;

/// Error type shared by all modules
pub mod error;
/// Level conversions and small numeric helpers
pub mod utils;
/// Window shapes and reconstruction laws
pub mod window;
/// Frame grid, frame cutting and overlap-add
pub mod framer;
/// Real transform of single frames
pub mod spectrum;
/// Complex spectrogram container
pub mod spectrogram;
/// Forward and inverse STFT
pub mod stft;
/// Sub-sample delay by phase rotation
pub mod delay;
/// Millisecond configuration surface
pub mod config;
/// Sample buffers and test signal generators
pub mod signal;
/// Frame-energy noise gate
pub mod gate;
/// Spectral subtraction and Wiener filtering
pub mod subtraction;
/// GCC-PHAT time-difference-of-arrival
pub mod tdoa;

pub use config::StftConfig;
pub use delay::{delay, delay_samples};
pub use error::{Result, StftError};
pub use framer::{cut, fold, FrameGrid, OverlapAdd};
pub use gate::{EnergyGate, EnergyGateConfig, GateState};
pub use signal::Signal;
pub use spectrogram::Spectrogram;
pub use spectrum::{from_spectrum, to_spectrum, FrameTransform};
pub use stft::{analyze, synthesize, Stft};
pub use subtraction::{NoiseProfile, SpectralSubtractor, SubtractionMode};
pub use window::{ReconstructionLaw, WindowShape, WindowSpec};

/// Floor applied to heat-map values from [`SpeechProcessor::spectrogram_db`]
const DISPLAY_FLOOR_DB: f64 = -120.0;

/// WebAssembly-compatible speech processor
/// Wraps a half-sine STFT and an energy gate built from one configuration
#[wasm_bindgen]
pub struct SpeechProcessor {
    sample_rate: u32,
    stft: Stft,
    gate: EnergyGate,
}

impl SpeechProcessor {
    /// Fallible constructor for native callers
    pub fn try_new(sample_rate: u32, window_length_ms: f64, window_step_ms: f64) -> Result<Self> {
        let config = StftConfig::new(sample_rate, window_length_ms, window_step_ms, WindowShape::HalfSine);
        let stft = config.build()?;
        let gate = EnergyGate::new(EnergyGateConfig::with_frame_step_ms(window_step_ms))?;

        Ok(Self {
            sample_rate,
            stft,
            gate,
        })
    }

    pub fn stft(&self) -> &Stft {
        &self.stft
    }
}

#[wasm_bindgen]
impl SpeechProcessor {
    /// Creates a processor for the given sample rate and window timing
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: u32,
        window_length_ms: f64,
        window_step_ms: f64,
    ) -> std::result::Result<SpeechProcessor, JsValue> {
        Self::try_new(sample_rate, window_length_ms, window_step_ms)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Log-power spectrogram flattened frame by frame
    /// Returns an empty vector if the signal is shorter than one window
    #[wasm_bindgen]
    pub fn spectrogram_db(&self, signal: &[f64]) -> Vec<f64> {
        match self.stft.analyze(signal) {
            Ok(spectrogram) => spectrogram
                .log_magnitude_db(DISPLAY_FLOOR_DB)
                .into_iter()
                .flatten()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Analysis followed by synthesis without modification
    #[wasm_bindgen]
    pub fn resynthesize(&self, signal: &[f64]) -> Vec<f64> {
        // If the round trip fails, pass the input through
        self.stft
            .process(signal, |_| Ok(()))
            .unwrap_or_else(|_| signal.to_vec())
    }

    /// Applies the energy gate in the STFT domain
    #[wasm_bindgen]
    pub fn gate(&self, signal: &[f64]) -> Vec<f64> {
        self.stft
            .process(signal, |spectrogram| self.gate.apply(spectrogram))
            .unwrap_or_else(|_| signal.to_vec())
    }

    /// Circularly delays the signal by `t0` seconds
    #[wasm_bindgen]
    pub fn delay(&self, signal: &[f64], t0: f64) -> Vec<f64> {
        delay::delay(signal, t0, self.sample_rate).unwrap_or_else(|_| signal.to_vec())
    }

    /// Sets the gate threshold relative to the mean frame energy
    #[wasm_bindgen]
    pub fn set_gate_offset_db(&mut self, offset_db: f64) {
        let config = self.gate.config().clone().with_threshold_offset_db(offset_db);
        if let Ok(gate) = EnergyGate::new(config) {
            self.gate = gate;
        }
    }

    /// Number of frames a signal of `length` samples yields
    #[wasm_bindgen]
    pub fn frame_count_for(&self, length: usize) -> usize {
        self.stft
            .frame_grid(length)
            .map(|grid| grid.frame_count())
            .unwrap_or(0)
    }

    /// Returns the number of frequency bins per frame
    #[wasm_bindgen(getter)]
    pub fn bin_count(&self) -> usize {
        self.stft.bin_count()
    }

    /// Returns the window length in samples
    #[wasm_bindgen(getter)]
    pub fn window_length(&self) -> usize {
        self.stft.window_length()
    }

    /// Returns the hop in samples
    #[wasm_bindgen(getter)]
    pub fn hop(&self) -> usize {
        self.stft.hop()
    }

    /// Returns the current sample rate
    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
