//! # Sensors Module
//!
//! Trait seam over the station's sensor hardware.
//!
//! This module handles:
//! - Raw reading types returned by the environmental, light, particulate and
//!   battery sensors
//! - The [`SensorSuite`] capability consumed by the observation builder
//! - A file-backed host implementation ([`feed::FeedSensors`])
//!
//! Drivers report physical quantities in the units the hardware produces; unit
//! conversions happen in the observation builder.

pub mod feed;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Temperature / humidity / pressure / gas reading.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EnvironmentReading {
    /// Air temperature in °C
    pub temperature_c: f64,
    /// Relative humidity in percent
    pub humidity_pct: f64,
    /// Station pressure in Pa
    pub pressure_pa: f64,
    /// Gas sensor resistance in Ω
    pub gas_resistance_ohm: f64,
}

/// Light intensities as reported by the sensor (raw counts).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LightReading {
    pub visible: f64,
    pub ir: f64,
    /// UV intensity; UV index = round(uv / 100)
    pub uv: f64,
}

/// One particulate sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ParticulateReading {
    /// PM1.0 mass concentration in µg/m³
    pub pm1_0: u16,
    /// PM2.5 mass concentration in µg/m³
    pub pm2_5: u16,
    /// PM10 mass concentration in µg/m³
    pub pm10_0: u16,
    /// Particle counts per 0.1 L above 0.3, 0.5, 1.0, 2.5, 5.0 and 10 µm
    pub counts: [u16; 6],
}

/// Capability over the station's sensor hardware.
///
/// Implementations own the power rail for the sensor block. Any method may
/// fail; the builder decides how failures are handled.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorSuite: Send {
    /// Switch the sensor power rail on or off.
    async fn set_power(&mut self, on: bool) -> Result<()>;

    /// Verify the primary sensors respond. Failure is fatal at boot.
    async fn detect(&mut self) -> Result<()>;

    /// Read the environmental sensor.
    async fn read_environment(&mut self) -> Result<EnvironmentReading>;

    /// Read the light sensor.
    async fn read_light(&mut self) -> Result<LightReading>;

    /// Poll the particulate sensor once.
    ///
    /// Returns `Ok(None)` until a fresh frame is available.
    async fn poll_particulates(&mut self) -> Result<Option<ParticulateReading>>;

    /// Read the battery divider through the 12-bit ADC.
    async fn read_battery_raw(&mut self) -> Result<u16>;
}
