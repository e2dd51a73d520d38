//! # Metric Calculator
//!
//! Pure numeric derivations used to turn raw sensor readings into secondary
//! atmospheric metrics.
//!
//! This module handles:
//! - Heat index (Steadman average with Rothfusz regression above 80°F)
//! - Dew point (Magnus-form approximation)
//! - Sea-level-adjusted pressure (barometric formula)
//! - Air quality index from PM2.5 / PM10 mass concentrations
//!
//! Every function is deterministic and free of I/O.

pub mod aqi;
pub mod thermo;

pub use aqi::{air_quality_index, aqi_pm10, aqi_pm25, AQI_OUT_OF_RANGE};
pub use thermo::{
    celsius_to_fahrenheit, dew_point, fahrenheit_to_celsius, heat_index, sea_level_pressure,
};
