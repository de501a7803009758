//! Millisecond-based configuration surface for the STFT
//!
//! Window length and step are given in milliseconds and converted to
//! sample counts with the sample rate. The window shape has no default and
//! must always be stated.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StftError};
use crate::signal::ms_to_samples;
use crate::stft::Stft;
use crate::window::{WindowShape, WindowSpec};

/// Defaults used by the speech examples: 30 ms windows at 50% overlap
pub mod defaults {
    pub const WINDOW_LENGTH_MS: f64 = 30.0;
    pub const WINDOW_STEP_MS: f64 = 15.0;
    pub const ZERO_PADDING_FACTOR: usize = 1;
}

fn default_zero_padding() -> usize {
    defaults::ZERO_PADDING_FACTOR
}

/// STFT configuration in physical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StftConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Window length in milliseconds
    pub window_length_ms: f64,

    /// Hop between successive windows in milliseconds
    pub window_step_ms: f64,

    /// Window shape; half-sine for any path that resynthesizes
    pub window_shape: WindowShape,

    /// Transform size as a multiple of the window length
    #[serde(default = "default_zero_padding")]
    pub fft_zero_padding_factor: usize,
}

impl StftConfig {
    pub fn new(sample_rate: u32, window_length_ms: f64, window_step_ms: f64, window_shape: WindowShape) -> Self {
        Self {
            sample_rate,
            window_length_ms,
            window_step_ms,
            window_shape,
            fft_zero_padding_factor: defaults::ZERO_PADDING_FACTOR,
        }
    }

    /// Half-sine, 30 ms windows, 15 ms step
    pub fn speech(sample_rate: u32) -> Self {
        Self::new(
            sample_rate,
            defaults::WINDOW_LENGTH_MS,
            defaults::WINDOW_STEP_MS,
            WindowShape::HalfSine,
        )
    }

    /// Builder method for the zero padding factor
    pub fn with_zero_padding(mut self, factor: usize) -> Self {
        self.fft_zero_padding_factor = factor;
        self
    }

    /// Window length in samples
    pub fn window_length(&self) -> usize {
        ms_to_samples(self.window_length_ms, self.sample_rate)
    }

    /// Hop in samples
    pub fn window_step(&self) -> usize {
        ms_to_samples(self.window_step_ms, self.sample_rate)
    }

    /// Window specification with the law the shape is designed for
    pub fn window_spec(&self) -> Result<WindowSpec> {
        WindowSpec::new(self.window_length(), self.window_shape, self.window_shape.natural_law())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(StftError::config("sample rate must be positive"));
        }

        if !(self.window_length_ms.is_finite() && self.window_length_ms > 0.0) {
            return Err(StftError::config(format!(
                "window length {} ms must be positive",
                self.window_length_ms
            )));
        }

        if !(self.window_step_ms.is_finite() && self.window_step_ms > 0.0) {
            return Err(StftError::config(format!(
                "window step {} ms must be positive",
                self.window_step_ms
            )));
        }

        if self.fft_zero_padding_factor == 0 {
            return Err(StftError::config("zero padding factor must be at least 1"));
        }

        // build() always yields a resynthesizing STFT, whatever the shape
        let window_length = self.window_length();
        if window_length % 2 != 0 {
            return Err(StftError::config(format!(
                "window length {} samples ({} ms at {} Hz) must be even for overlap-add",
                window_length, self.window_length_ms, self.sample_rate
            )));
        }

        let spec = self.window_spec()?;
        spec.validate_hop(self.window_step())
    }

    /// Validate and plan the transform
    pub fn build(&self) -> Result<Stft> {
        self.validate()?;
        Stft::with_zero_padding(self.window_spec()?, self.window_step(), self.fft_zero_padding_factor)
    }
}
