//! Short-time Fourier analysis and overlap-add synthesis
//!
//! Forward: frames are cut at a fixed hop, multiplied by the analysis
//! window and transformed to half-spectra. Inverse: every row is
//! inverse-transformed, multiplied by the synthesis window and folded into
//! an overlap-add accumulator.
//!
//! With a Princen-Bradley window (half-sine, analysis+synthesis law) at
//! 50% overlap an unmodified spectrogram reconstructs the input exactly on
//! every sample covered by two frames. The first and last half-window only
//! see one frame and come back windowed twice.
//!
//! Calls are stateless: each owns its spectrogram or accumulator, so a
//! single [`Stft`] may be shared between threads.

use tracing::{debug, trace};

use crate::error::{Result, StftError};
use crate::framer::{cut, FrameGrid, OverlapAdd};
use crate::spectrogram::Spectrogram;
use crate::spectrum::FrameTransform;
use crate::window::{apply_window, WindowSpec};

// ============================================================================
// Pipeline Stages
// ============================================================================

/// Steps of a forward or inverse call, reported through `tracing`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Framing,
    Windowing,
    Transforming,
    InverseTransforming,
    SynthesisWindowing,
    Accumulating,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Framing => "framing",
            Stage::Windowing => "windowing",
            Stage::Transforming => "transforming",
            Stage::InverseTransforming => "inverse-transforming",
            Stage::SynthesisWindowing => "synthesis-windowing",
            Stage::Accumulating => "accumulating",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

// ============================================================================
// STFT
// ============================================================================

/// Validated analysis/synthesis configuration with a planned transform
#[derive(Debug, Clone)]
pub struct Stft {
    window: WindowSpec,
    hop: usize,
    transform: FrameTransform,
    analysis_window: Vec<f64>,
    synthesis_window: Vec<f64>,
}

impl Stft {
    /// Transform size equal to the window length
    pub fn new(window: WindowSpec, hop: usize) -> Result<Self> {
        Self::with_zero_padding(window, hop, 1)
    }

    /// Transform size `window.length() · padding_factor`; frames are
    /// zero-filled up to the transform size before the forward transform
    pub fn with_zero_padding(window: WindowSpec, hop: usize, padding_factor: usize) -> Result<Self> {
        if padding_factor == 0 {
            return Err(StftError::config("zero padding factor must be at least 1"));
        }
        window.validate_hop(hop)?;

        let fft_size = window.length() * padding_factor;
        let transform = FrameTransform::new(fft_size)?;

        debug!(
            window_length = window.length(),
            shape = %window.shape(),
            law = ?window.law(),
            hop,
            fft_size,
            "configured STFT"
        );

        Ok(Self {
            analysis_window: window.analysis_window(),
            synthesis_window: window.synthesis_window(),
            window,
            hop,
            transform,
        })
    }

    #[inline]
    pub fn window(&self) -> &WindowSpec {
        &self.window
    }

    #[inline]
    pub fn window_length(&self) -> usize {
        self.window.length()
    }

    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.transform.size()
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.transform.bin_count()
    }

    /// Frame layout this configuration would use for `signal_length` samples
    pub fn frame_grid(&self, signal_length: usize) -> Result<FrameGrid> {
        FrameGrid::new(signal_length, self.window.length(), self.hop)
    }

    /// Largest deviation from unity of the overlap-added window product
    pub fn reconstruction_error(&self) -> Result<f64> {
        self.window.reconstruction_error(self.hop)
    }

    /// Signal to spectrogram
    pub fn analyze(&self, signal: &[f64]) -> Result<Spectrogram> {
        let window_length = self.window.length();
        let grid = self.frame_grid(signal.len())?;
        trace!(
            stage = %Stage::Idle,
            samples = signal.len(),
            frames = grid.frame_count(),
            fft_size = self.fft_size(),
            "analyze"
        );

        trace!(stage = %Stage::Framing);
        let frames = cut(signal, window_length, self.hop)?;

        let mut rows = Vec::with_capacity(frames.len());
        let mut windowed = vec![0.0; window_length];
        for (k, frame) in frames.into_iter().enumerate() {
            trace!(stage = %Stage::Windowing, frame = k);
            windowed.copy_from_slice(frame);
            apply_window(&mut windowed, &self.analysis_window)?;

            trace!(stage = %Stage::Transforming, frame = k);
            rows.push(self.transform.to_spectrum(&windowed)?);
        }

        let spectrogram = Spectrogram::from_frames(rows, window_length, self.fft_size(), self.hop)?;
        trace!(stage = %Stage::Done, frames = spectrogram.frame_count(), bins = spectrogram.bin_count());
        Ok(spectrogram)
    }

    /// Spectrogram back to signal by windowed overlap-add
    ///
    /// The output has `(frame_count - 1)·hop + window_length` samples.
    pub fn synthesize(&self, spectrogram: &Spectrogram) -> Result<Vec<f64>> {
        self.check_layout(spectrogram)?;

        let window_length = self.window.length();
        let fft_size = self.fft_size();
        trace!(stage = %Stage::Idle, frames = spectrogram.frame_count(), fft_size, "synthesize");

        let mut accumulator = OverlapAdd::new(spectrogram.frame_count(), window_length, self.hop)?;
        for (k, row) in spectrogram.frames().enumerate() {
            trace!(stage = %Stage::InverseTransforming, frame = k);
            let mut frame = self.transform.from_spectrum(row, fft_size)?;
            frame.truncate(window_length);

            trace!(stage = %Stage::SynthesisWindowing, frame = k);
            apply_window(&mut frame, &self.synthesis_window)?;

            trace!(stage = %Stage::Accumulating, frame = k);
            accumulator.add(k, &frame)?;
        }

        let output = accumulator.into_signal();
        trace!(stage = %Stage::Done, samples = output.len());
        Ok(output)
    }

    /// Analyze, let `modify` edit the spectrogram, then synthesize
    pub fn process<F>(&self, signal: &[f64], modify: F) -> Result<Vec<f64>>
    where
        F: FnOnce(&mut Spectrogram) -> Result<()>,
    {
        let mut spectrogram = self.analyze(signal)?;
        modify(&mut spectrogram)?;
        self.synthesize(&spectrogram)
    }

    fn check_layout(&self, spectrogram: &Spectrogram) -> Result<()> {
        if spectrogram.bin_count() != self.bin_count() {
            return Err(StftError::ShapeMismatch {
                what: "bin count",
                expected: self.bin_count(),
                actual: spectrogram.bin_count(),
            });
        }
        if spectrogram.window_length() != self.window.length() {
            return Err(StftError::ShapeMismatch {
                what: "window length",
                expected: self.window.length(),
                actual: spectrogram.window_length(),
            });
        }
        if spectrogram.hop() != self.hop {
            return Err(StftError::ShapeMismatch {
                what: "hop",
                expected: self.hop,
                actual: spectrogram.hop(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Stateless Entry Points
// ============================================================================

/// Forward STFT of `signal` with the given window and hop
pub fn analyze(signal: &[f64], window: &WindowSpec, hop: usize) -> Result<Spectrogram> {
    Stft::new(*window, hop)?.analyze(signal)
}

/// Inverse STFT; the zero padding used on analysis is read from the
/// spectrogram's transform size
pub fn synthesize(spectrogram: &Spectrogram, window: &WindowSpec, hop: usize) -> Result<Vec<f64>> {
    let window_length = window.length();
    let fft_size = spectrogram.fft_size();
    if fft_size < window_length || fft_size % window_length != 0 {
        return Err(StftError::ShapeMismatch {
            what: "bin count",
            expected: window_length / 2 + 1,
            actual: spectrogram.bin_count(),
        });
    }

    Stft::with_zero_padding(*window, hop, fft_size / window_length)?.synthesize(spectrogram)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::white_noise;
    use crate::window::{ReconstructionLaw, WindowShape};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Metadata, Subscriber};

    const EPSILON: f64 = 1e-9;

    fn noise(length: usize, seed: u64) -> Vec<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        white_noise(length, 1.0, &mut rng)
    }

    #[test]
    fn test_stft_creation() {
        let window = WindowSpec::half_sine(512).unwrap();
        assert!(Stft::new(window, 256).is_ok());
        assert!(Stft::new(window, 512).is_ok());
        assert!(Stft::new(window, 0).is_err());
        assert!(Stft::new(window, 513).is_err());
        assert!(Stft::with_zero_padding(window, 256, 0).is_err());

        let stft = Stft::with_zero_padding(window, 256, 4).unwrap();
        assert_eq!(stft.fft_size(), 2048);
        assert_eq!(stft.bin_count(), 1025);
    }

    #[test]
    fn test_perfect_reconstruction_interior() {
        let window_length = 256;
        let hop = window_length / 2;
        let signal = noise(5000, 11);
        let window = WindowSpec::half_sine(window_length).unwrap();

        let spectrogram = analyze(&signal, &window, hop).unwrap();
        let output = synthesize(&spectrogram, &window, hop).unwrap();

        let grid = FrameGrid::new(signal.len(), window_length, hop).unwrap();
        assert_eq!(output.len(), grid.output_length());

        for m in window_length / 2..output.len() - window_length / 2 {
            let tolerance = EPSILON * signal[m].abs().max(1.0);
            assert!(
                (output[m] - signal[m]).abs() < tolerance,
                "sample {}: {} vs {}",
                m,
                output[m],
                signal[m]
            );
        }
    }

    #[test]
    fn test_boundary_half_windows_are_windowed_twice() {
        let window_length = 16;
        let signal = vec![1.0; 64];
        let spec = WindowSpec::half_sine(window_length).unwrap();
        let w = spec.analysis_window();

        let output = synthesize(&analyze(&signal, &spec, 8).unwrap(), &spec, 8).unwrap();
        for n in 0..8 {
            assert!((output[n] - w[n] * w[n]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_single_frame() {
        let window_length = 32;
        let signal: Vec<f64> = (0..window_length).map(|i| (i as f64 * 0.3).sin()).collect();
        let spec = WindowSpec::half_sine(window_length).unwrap();
        let w = spec.analysis_window();

        let spectrogram = analyze(&signal, &spec, 16).unwrap();
        assert_eq!(spectrogram.frame_count(), 1);
        assert_eq!(spectrogram.bin_count(), 17);

        let output = synthesize(&spectrogram, &spec, 16).unwrap();
        assert_eq!(output.len(), window_length);
        for n in 0..window_length {
            assert!((output[n] - signal[n] * w[n] * w[n]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_hann_analysis_only_reconstructs() {
        let spec = WindowSpec::hann(128).unwrap();
        let stft = Stft::new(spec, 64).unwrap();
        assert!(stft.reconstruction_error().unwrap() < EPSILON);

        let signal = noise(2048, 3);
        let output = stft.synthesize(&stft.analyze(&signal).unwrap()).unwrap();
        for m in 64..output.len() - 64 {
            assert!((output[m] - signal[m]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_general_hop_with_normalised_window() {
        // Squared half-sine at 75% overlap sums to 2, a constant gain
        let stft = Stft::new(WindowSpec::half_sine(64).unwrap(), 16).unwrap();
        assert!((stft.reconstruction_error().unwrap() - 1.0).abs() < EPSILON);

        let signal = noise(1024, 8);
        let output = stft.synthesize(&stft.analyze(&signal).unwrap()).unwrap();
        for m in 64..output.len() - 64 {
            assert!((output[m] / 2.0 - signal[m]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_zero_padding_round_trip() {
        let spec = WindowSpec::half_sine(64).unwrap();
        let stft = Stft::with_zero_padding(spec, 32, 2).unwrap();
        let signal = noise(1000, 21);

        let spectrogram = stft.analyze(&signal).unwrap();
        assert_eq!(spectrogram.bin_count(), 65);
        assert_eq!(spectrogram.fft_size(), 128);

        let output = synthesize(&spectrogram, &spec, 32).unwrap();
        for m in 32..output.len() - 32 {
            assert!((output[m] - signal[m]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_frame_order_preserved() {
        let window_length = 64;
        let hop = 32;
        let signal: Vec<f64> = (0..640).map(|i| if i / 64 % 2 == 0 { 0.0 } else { 1.0 }).collect();
        let spec = WindowSpec::half_sine(window_length).unwrap();
        let spectrogram = analyze(&signal, &spec, hop).unwrap();
        let w = spec.analysis_window();

        for k in 0..spectrogram.frame_count() {
            let expected_dc: f64 = signal[k * hop..k * hop + window_length]
                .iter()
                .zip(w.iter())
                .map(|(s, w)| s * w)
                .sum();
            assert!((spectrogram.frame(k)[0].re - expected_dc).abs() < 1e-9);
        }
    }

    #[test]
    fn test_errors_detected_before_work() {
        let spec = WindowSpec::half_sine(64).unwrap();
        assert!(matches!(
            analyze(&[0.0; 63], &spec, 32),
            Err(StftError::InsufficientSamples { needed: 64, available: 63 })
        ));

        let stft = Stft::new(spec, 32).unwrap();
        let spectrogram = stft.analyze(&[0.0; 256]).unwrap();

        let other = Stft::new(WindowSpec::half_sine(32).unwrap(), 16).unwrap();
        assert!(matches!(
            other.synthesize(&spectrogram),
            Err(StftError::ShapeMismatch { what: "bin count", expected: 17, actual: 33 })
        ));

        let other_hop = Stft::new(spec, 16).unwrap();
        assert!(matches!(
            other_hop.synthesize(&spectrogram),
            Err(StftError::ShapeMismatch { what: "hop", .. })
        ));

        let odd = WindowSpec::new(48, WindowShape::Hann, ReconstructionLaw::AnalysisOnly).unwrap();
        assert!(synthesize(&spectrogram, &odd, 32).is_err());
    }

    #[test]
    fn test_process_applies_modification() {
        let stft = Stft::new(WindowSpec::half_sine(128).unwrap(), 64).unwrap();
        let signal: Vec<f64> = (0..4096).map(|i| (2.0 * PI * 440.0 * i as f64 / 16000.0).sin()).collect();

        let silent = stft
            .process(&signal, |spectrogram| {
                let gains = vec![0.0; spectrogram.frame_count()];
                spectrogram.apply_frame_gains(&gains)
            })
            .unwrap();
        assert!(silent.iter().all(|x| x.abs() < EPSILON));

        let halved = stft
            .process(&signal, |spectrogram| {
                let gains = vec![0.5; spectrogram.frame_count()];
                spectrogram.apply_frame_gains(&gains)
            })
            .unwrap();
        for m in 64..halved.len() - 64 {
            assert!((halved[m] - 0.5 * signal[m]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::InverseTransforming.to_string(), "inverse-transforming");
        assert_eq!(Stage::Done.to_string(), "done");
    }

    /// Collects the `stage` field of every event
    struct StageRecorder {
        stages: Arc<Mutex<Vec<String>>>,
    }

    struct StageVisitor(Option<String>);

    impl Visit for StageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "stage" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl Subscriber for StageRecorder {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _: &Id, _: &Record<'_>) {}

        fn record_follows_from(&self, _: &Id, _: &Id) {}

        fn event(&self, event: &Event<'_>) {
            let mut visitor = StageVisitor(None);
            event.record(&mut visitor);
            if let Some(stage) = visitor.0 {
                self.stages.lock().unwrap().push(stage);
            }
        }

        fn enter(&self, _: &Id) {}

        fn exit(&self, _: &Id) {}
    }

    fn recorded_stages<F: FnOnce()>(f: F) -> Vec<String> {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let recorder = StageRecorder {
            stages: Arc::clone(&stages),
        };
        tracing::subscriber::with_default(recorder, f);
        let recorded = stages.lock().unwrap().clone();
        recorded
    }

    #[test]
    fn test_stages_follow_the_work() {
        let stft = Stft::new(WindowSpec::half_sine(8).unwrap(), 4).unwrap();
        let signal = noise(16, 12);
        let spectrogram = stft.analyze(&signal).unwrap();
        assert_eq!(spectrogram.frame_count(), 3);

        let analysis = recorded_stages(|| {
            stft.analyze(&signal).unwrap();
        });
        let mut expected = vec!["idle", "framing"];
        for _ in 0..3 {
            expected.extend(["windowing", "transforming"]);
        }
        expected.push("done");
        assert_eq!(analysis, expected);

        let synthesis = recorded_stages(|| {
            stft.synthesize(&spectrogram).unwrap();
        });
        let mut expected = vec!["idle"];
        for _ in 0..3 {
            expected.extend(["inverse-transforming", "synthesis-windowing", "accumulating"]);
        }
        expected.push("done");
        assert_eq!(synthesis, expected);
    }

    #[test]
    fn test_stft_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Stft>();
        assert_send_sync::<Spectrogram>();

        let stft = Arc::new(Stft::new(WindowSpec::half_sine(64).unwrap(), 32).unwrap());
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let stft = Arc::clone(&stft);
                std::thread::spawn(move || {
                    let signal = noise(1024, seed);
                    let output = stft.process(&signal, |_| Ok(())).unwrap();
                    (signal, output)
                })
            })
            .collect();

        for handle in handles {
            let (signal, output) = handle.join().unwrap();
            for m in 32..output.len() - 32 {
                assert!((output[m] - signal[m]).abs() < EPSILON);
            }
        }
    }
}
