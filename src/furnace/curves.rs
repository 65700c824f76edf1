// Empirical furnace curves, sampled once per measurement interval.
// Temperatures are for a 1000 °C setpoint and scale linearly with it.

use std::ops::{Range, RangeInclusive};

pub const HEATING_TEMPERATURE_CURVE: [f64; 9] = [
    0.00, 408.25, 577.35, 707.11, 816.50, 912.87, 988.00, 1013.56, 1001.00,
];

/// Power draw in kW, index-aligned with [`HEATING_TEMPERATURE_CURVE`].
pub const HEATING_POWER_CURVE: [i64; 9] = [0, 7, 27, 30, 31, 29, 30, 30, 31];

pub const COOLING_TEMPERATURE_CURVE: [f64; 7] = [999.00, 857.14, 375.00, 56.60, 5.96, 0.60, 0.0];

/// Setpoint the curves are expressed against.
pub const REFERENCE_SETPOINT: f64 = 1000.0;

/// Holding lasts 16 iterations at 760 °C and scales inversely with setpoint.
const HOLDING_ITERATIONS_AT_760: f64 = 16.0 * 760.0;

pub const HOLDING_TEMPERATURE_NOISE: RangeInclusive<f64> = -0.5..=0.5;

/// Holding power draw in kW before truncation.
pub const HOLDING_POWER_KW: Range<f64> = 27.0..33.0;

/// Extra wait after holding, on top of half a measurement interval.
pub const SETTLE_JITTER_SECS: Range<f64> = -2.0..2.0;

pub fn scale(temperature: f64, setpoint: f64) -> f64 {
    temperature * setpoint / REFERENCE_SETPOINT
}

/// `ceil(16 / setpoint * 760)`, evaluated as a single division so that
/// setpoints dividing 12160 exactly do not round up.
pub fn holding_iterations(setpoint: f64) -> u32 {
    (HOLDING_ITERATIONS_AT_760 / setpoint).ceil() as u32
}
