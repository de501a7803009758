//! Level conversions and small numeric helpers

/// Floor below which a dB value maps to zero linear amplitude
pub const DB_NOISE_FLOOR: f64 = -200.0;

/// Guard added to denominators when dividing by an energy
pub const ENERGY_EPSILON: f64 = 1e-24;

// ============================================================================
// Core Conversion Functions
// ============================================================================

/// Convert linear amplitude to decibels
/// Returns -inf for zero or negative values
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Convert decibels to linear amplitude
/// Clamps to 0.0 for very negative dB values
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    if db <= DB_NOISE_FLOOR {
        0.0
    } else {
        10.0_f64.powf(db / 20.0)
    }
}

/// Convert an energy or power to decibels
#[inline]
pub fn power_to_db(power: f64) -> f64 {
    if power <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * power.log10()
    }
}

/// Convert decibels to an energy or power ratio
#[inline]
pub fn db_to_power(db: f64) -> f64 {
    if db <= DB_NOISE_FLOOR {
        0.0
    } else {
        10.0_f64.powf(db / 10.0)
    }
}

// ============================================================================
// Level Detection
// ============================================================================

/// Sum of squares
#[inline]
pub fn energy(buffer: &[f64]) -> f64 {
    buffer.iter().map(|&x| x * x).sum()
}

/// Root mean square; zero for an empty buffer
#[inline]
pub fn rms(buffer: &[f64]) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    (energy(buffer) / buffer.len() as f64).sqrt()
}

/// Arithmetic mean of the finite values; `None` when there are none
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
