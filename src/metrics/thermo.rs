//! # Thermodynamic Metrics
//!
//! Heat index, dew point, temperature conversions and sea-level pressure.
//!
//! ## Heat Index
//!
//! The simple Steadman formula is computed first and averaged with the
//! temperature:
//!
//! `HI = 0.5 * (T + 61.0 + (T - 68.0) * 1.2 + RH * 0.094)`
//!
//! If that value exceeds 80°F the Rothfusz regression replaces it, followed by
//! the low-humidity or high-humidity adjustment where applicable. Inputs
//! outside the regression's validity range are accepted as an approximation.
//!
//! ## Usage
//!
//! ```
//! use weather_station::metrics::thermo::{celsius_to_fahrenheit, heat_index};
//!
//! let hi = heat_index(celsius_to_fahrenheit(21.0), 40.0);
//! assert!(hi < 80.0);
//! ```

/// Threshold above which the Rothfusz regression applies (°F).
pub const ROTHFUSZ_THRESHOLD_F: f64 = 80.0;

/// Reference altitude constant of the international barometric formula (m).
pub const BAROMETRIC_SCALE_HEIGHT_M: f64 = 44_330.0;

/// Exponent of the international barometric formula.
pub const BAROMETRIC_EXPONENT: f64 = 5.255;

/// Magnus coefficients (Alduchov & Eskridge, 1996).
const MAGNUS_A: f64 = 17.625;
const MAGNUS_B: f64 = 243.04;

/// Computes the heat index in °F.
///
/// # Arguments
///
/// * `t` - Air temperature in degrees Fahrenheit
/// * `rh` - Relative humidity in percent
///
/// # Examples
///
/// ```
/// use weather_station::metrics::thermo::heat_index;
///
/// // Below the threshold the Steadman average is used as-is
/// assert!((heat_index(70.0, 50.0) - 69.05).abs() < 1e-9);
/// ```
#[must_use]
pub fn heat_index(t: f64, rh: f64) -> f64 {
    let steadman = steadman(t, rh);
    if steadman <= ROTHFUSZ_THRESHOLD_F {
        return steadman;
    }

    let mut hi = rothfusz(t, rh);
    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }
    hi
}

fn steadman(t: f64, rh: f64) -> f64 {
    0.5 * (t + 61.0 + ((t - 68.0) * 1.2) + (rh * 0.094))
}

fn rothfusz(t: f64, rh: f64) -> f64 {
    -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 0.006_837_83 * t * t
        - 0.054_817_17 * rh * rh
        + 0.001_228_74 * t * t * rh
        + 0.000_852_82 * t * rh * rh
        - 0.000_001_99 * t * t * rh * rh
}

/// Computes the dew point in °C.
///
/// The caller must guarantee `rh > 0`; the logarithm is undefined otherwise
/// and the result is NaN or infinite.
///
/// # Examples
///
/// ```
/// use weather_station::metrics::thermo::dew_point;
///
/// assert!((dew_point(20.0, 50.0) - 9.27).abs() < 0.01);
/// ```
#[must_use]
pub fn dew_point(t: f64, rh: f64) -> f64 {
    let gamma = (rh / 100.0).ln() + (MAGNUS_A * t) / (MAGNUS_B + t);
    MAGNUS_B * gamma / (MAGNUS_A - gamma)
}

/// Converts degrees Celsius to degrees Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 1.8 + 32.0
}

/// Converts degrees Fahrenheit to degrees Celsius.
#[must_use]
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) / 1.8
}

/// Corrects station pressure to the equivalent sea-level pressure.
///
/// # Arguments
///
/// * `pressure` - Station pressure (any unit, the result uses the same unit)
/// * `altitude_m` - Station altitude in meters
#[must_use]
pub fn sea_level_pressure(pressure: f64, altitude_m: f64) -> f64 {
    pressure / (1.0 - altitude_m / BAROMETRIC_SCALE_HEIGHT_M).powf(BAROMETRIC_EXPONENT)
}
