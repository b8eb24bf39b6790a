//! Intensity derivation for auto mode.
//!
//! Rounding is half-up (`floor(x + 0.5)`), so `-0.5` rounds to `0` and
//! `2.5` to `3`.

use chrono::{DateTime, Utc};

pub const MIN_INTENSITY: u8 = 0;
pub const MAX_INTENSITY: u8 = 10;

const PRESSURE_DIVISOR: f64 = 10.0;
const TEMPERATURE_DIVISOR: f64 = 5.0;
const PRESSURE_WEIGHT: f64 = 0.6;
const TEMPERATURE_WEIGHT: f64 = 0.2;
const WAVE_WEIGHT: f64 = 0.2;
const WAVE_AMPLITUDE: f64 = 2.0;

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn clamp_influence(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    round_half_up(value).clamp(f64::from(MIN_INTENSITY), f64::from(MAX_INTENSITY)) as i32
}

pub fn pressure_influence(pressure_kpa: f64) -> i32 {
    clamp_influence(pressure_kpa / PRESSURE_DIVISOR)
}

pub fn temperature_influence(temperature_c: f64) -> i32 {
    clamp_influence(temperature_c / TEMPERATURE_DIVISOR)
}

/// Synthetic oscillation in `[-2, 2]` driven only by wall-clock seconds.
pub fn wave_pattern(now: DateTime<Utc>) -> f64 {
    let seconds = now.timestamp_millis() as f64 / 1000.0;
    seconds.sin() * WAVE_AMPLITUDE
}

/// Unsmoothed intensity for one sample.
pub fn target_intensity(pressure_kpa: f64, temperature_c: f64, wave: f64) -> i32 {
    let blended = f64::from(pressure_influence(pressure_kpa)) * PRESSURE_WEIGHT
        + f64::from(temperature_influence(temperature_c)) * TEMPERATURE_WEIGHT
        + wave * WAVE_WEIGHT;
    round_half_up(blended) as i32
}

/// One smoothing step with a fixed factor of 0.5, clamped to the device scale.
pub fn smooth(target: i32, previous: u8) -> u8 {
    let averaged = round_half_up(f64::from(target + i32::from(previous)) / 2.0);
    averaged.clamp(f64::from(MIN_INTENSITY), f64::from(MAX_INTENSITY)) as u8
}

pub fn next_intensity(
    pressure_kpa: f64,
    temperature_c: f64,
    previous: u8,
    now: DateTime<Utc>,
) -> u8 {
    let target = target_intensity(pressure_kpa, temperature_c, wave_pattern(now));
    smooth(target, previous)
}
