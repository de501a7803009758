//! Integration tests for speech-stft-core

use num_complex::Complex64;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use speech_stft_core::gate::{EnergyGate, EnergyGateConfig};
use speech_stft_core::signal::{add_noise_at_snr, narrowband_pulse, white_noise};
use speech_stft_core::subtraction::{NoiseProfile, SpectralSubtractor};
use speech_stft_core::{
    analyze, delay, from_spectrum, synthesize, tdoa, to_spectrum, Stft, StftConfig, StftError,
    WindowShape, WindowSpec,
};

const EPSILON: f64 = 1e-9;

/// Generate synthetic audio with three formant-like partials
fn generate_speech(sample_rate: u32, length: usize, amplitude: f64) -> Vec<f64> {
    (0..length)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let two_pi = 2.0 * std::f64::consts::PI;
            amplitude
                * (0.5 * (two_pi * 300.0 * t).sin()
                    + 0.3 * (two_pi * 1000.0 * t).sin()
                    + 0.2 * (two_pi * 2500.0 * t).sin())
        })
        .collect()
}

fn energy(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

#[test]
fn test_round_trip_identity() {
    let mut rng = SmallRng::seed_from_u64(1);
    let window = WindowSpec::half_sine(512).unwrap();
    let hop = 256;
    // 60 hops plus one window: every sample but the outer half-windows is
    // covered by two frames
    let x = white_noise(60 * hop + 512, 1.0, &mut rng);

    let spectrogram = analyze(&x, &window, hop).unwrap();
    let y = synthesize(&spectrogram, &window, hop).unwrap();
    assert_eq!(y.len(), x.len());

    for m in 256..x.len() - 256 {
        let tolerance = EPSILON * x[m].abs().max(1.0);
        assert!((y[m] - x[m]).abs() < tolerance, "sample {}: {} vs {}", m, y[m], x[m]);
    }
}

#[test]
fn test_energy_conserved_without_processing() {
    let config = StftConfig::speech(16000);
    let stft = config.build().unwrap();
    let x = generate_speech(16000, 66 * 240, 0.3);

    let y = stft.process(&x, |_| Ok(())).unwrap();
    let interior = 240..x.len() - 240;
    let e_in = energy(&x[interior.clone()]);
    let e_out = energy(&y[interior]);
    assert!((e_in - e_out).abs() < EPSILON * e_in);
}

#[test]
fn test_frame_transform_round_trip() {
    let mut rng = SmallRng::seed_from_u64(2);
    for n in [8, 16, 256, 1024] {
        let frame = white_noise(n, 1.0, &mut rng);
        let restored = from_spectrum(&to_spectrum(&frame).unwrap(), n).unwrap();
        for (a, b) in frame.iter().zip(restored.iter()) {
            assert!((a - b).abs() < EPSILON);
        }
    }
}

#[test]
fn test_impulse_spectrum_is_flat() {
    let x = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    let spectrum = to_spectrum(&x).unwrap();
    assert_eq!(spectrum.len(), 5);
    for bin in spectrum {
        assert!((bin - Complex64::new(1.0, 0.0)).norm() < 1e-12);
    }
}

#[test]
fn test_half_sine_princen_bradley() {
    for length in [4, 8, 480, 512, 1024] {
        let w = WindowShape::HalfSine.generate(length);
        let half = length / 2;
        for n in 0..half {
            assert!((w[n] * w[n] + w[n + half] * w[n + half] - 1.0).abs() < EPSILON);
        }
    }

    let w = WindowShape::HalfSine.generate(4);
    assert!((w[0] * w[0] + w[2] * w[2] - 1.0).abs() < 1e-12);
    assert!((w[1] * w[1] + w[3] * w[3] - 1.0).abs() < 1e-12);
}

#[test]
fn test_single_frame_is_windowed_twice() {
    let window = WindowSpec::half_sine(16).unwrap();
    let x: Vec<f64> = (0..16).map(|i| 1.0 + i as f64).collect();

    let spectrogram = analyze(&x, &window, 8).unwrap();
    assert_eq!(spectrogram.frame_count(), 1);

    let y = synthesize(&spectrogram, &window, 8).unwrap();
    let w = window.analysis_window();
    for i in 0..16 {
        assert!((y[i] - x[i] * w[i] * w[i]).abs() < EPSILON);
    }
}

#[test]
fn test_fractional_delay_identity() {
    let mut rng = SmallRng::seed_from_u64(3);
    let fs = 16000;
    let t0 = 0.7 / fs as f64;

    for length in [4000, 4001] {
        let x = white_noise(length, 1.0, &mut rng);
        let same = delay(&x, 0.0, fs).unwrap();
        let restored = delay(&delay(&x, t0, fs).unwrap(), -t0, fs).unwrap();

        for i in 0..x.len() {
            assert!((same[i] - x[i]).abs() < EPSILON);
            assert!((restored[i] - x[i]).abs() < EPSILON, "length {} sample {}", length, i);
        }
    }
}

#[test]
fn test_short_signal_rejected() {
    let stft = StftConfig::speech(16000).build().unwrap();
    assert!(matches!(
        stft.analyze(&[0.0; 100]),
        Err(StftError::InsufficientSamples { needed: 480, available: 100 })
    ));
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
        sample_rate = 16000
        window_length_ms = 32.0
        window_step_ms = 16.0
        window_shape = "half-sine"
        fft_zero_padding_factor = 2
    "#;

    let config: StftConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.window_shape, WindowShape::HalfSine);
    assert_eq!(config.window_length(), 512);

    let stft = config.build().unwrap();
    assert_eq!(stft.fft_size(), 1024);

    let serialized = toml::to_string(&config).unwrap();
    let parsed: StftConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_requires_window_shape() {
    let toml_str = r#"
        sample_rate = 16000
        window_length_ms = 30.0
        window_step_ms = 15.0
    "#;
    assert!(toml::from_str::<StftConfig>(toml_str).is_err());

    let toml_str = r#"
        sample_rate = 16000
        window_length_ms = 30.0
        window_step_ms = 15.0
        window_shape = "hann"
    "#;
    let config: StftConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.fft_zero_padding_factor, 1);
}

#[test]
fn test_gate_then_subtraction_pipeline() {
    let fs = 16000;
    let mut rng = SmallRng::seed_from_u64(4);
    let stft = StftConfig::speech(fs).build().unwrap();

    // One second of noise with a tone burst in the middle
    let noise_only = white_noise(fs as usize, 0.01, &mut rng);
    let mut noisy = white_noise(fs as usize, 0.01, &mut rng);
    let burst = generate_speech(fs, 4000, 0.5);
    for (dst, src) in noisy[6000..].iter_mut().zip(burst.iter()) {
        *dst += src;
    }

    let profile = NoiseProfile::from_signal(&stft, &noise_only).unwrap();
    let subtractor = SpectralSubtractor::builder().build(profile).unwrap();
    let gate = EnergyGate::new(EnergyGateConfig::with_frame_step_ms(15.0)).unwrap();

    let enhanced = stft
        .process(&noisy, |spectrogram| {
            subtractor.apply(spectrogram)?;
            gate.apply(spectrogram)
        })
        .unwrap();

    // Leading noise is removed entirely by the gate
    assert!(energy(&enhanced[..4000]) < 1e-20);
    // The burst survives
    let e_in = energy(&noisy[7000..9000]);
    let e_out = energy(&enhanced[7000..9000]);
    assert!(e_out > 0.8 * e_in, "{} vs {}", e_out, e_in);
}

#[test]
fn test_tdoa_on_noisy_pulses() {
    let fs = 16000;
    let mut rng = SmallRng::seed_from_u64(5);
    // Broadband source with a tonal burst riding on it
    let mut source = white_noise((fs / 2) as usize, 0.3, &mut rng);
    let pulse = narrowband_pulse(1.0, 0.5, 500.0, fs, &mut rng);
    for (dst, src) in source.iter_mut().zip(pulse.iter()) {
        *dst += src;
    }
    let clean = source;

    let lag = 12;
    let mut first = clean.clone();
    first.extend(std::iter::repeat(0.0).take(lag));
    let mut second = vec![0.0; lag];
    second.extend_from_slice(&clean);

    // Independent sensor noise on each channel
    let first = add_noise_at_snr(&first, 20.0, &mut rng);
    let second = add_noise_at_snr(&second, 20.0, &mut rng);

    let stft = Stft::new(WindowSpec::half_sine(512).unwrap(), 256).unwrap();
    let a = stft.analyze(&first).unwrap();
    let b = stft.analyze(&second).unwrap();
    assert_eq!(tdoa::estimate_delay(&a, &b).unwrap(), lag as isize);
}
