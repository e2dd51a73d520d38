//! # Observation Builder
//!
//! Powers the sensor block, reads every sensor and assembles one complete
//! [`Observation`], applying unit conversions and the derived metrics.
//!
//! ## Failure policy
//!
//! - Detection failure after power-up is fatal ([`StationError::SensorUnavailable`]).
//! - A failed or timed-out read is logged and the affected fields keep their
//!   placeholder; the observation is still returned.
//!
//! ## Conversions
//!
//! | Field | Source | Conversion |
//! |-------|--------|------------|
//! | Pressure [hPa] | Pa | / 100 |
//! | Pressure (PMSL) [hPa] | hPa, altitude | barometric formula |
//! | Air [KOhms] | Ω | / 1000 |
//! | Heat Index [C] | °C, %RH | via °F |
//! | UV-Index | UV raw | round(uv / 100) |
//! | Battery [V] | 12-bit ADC | raw / 4095 · 2 · 3.3 · 1.1 |

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use super::schema::FieldKey;
use super::Observation;
use crate::error::{Result, StationError};
use crate::metrics::{
    air_quality_index, celsius_to_fahrenheit, dew_point, fahrenheit_to_celsius, heat_index,
    sea_level_pressure,
};
use crate::sensors::{EnvironmentReading, LightReading, ParticulateReading, SensorSuite};

/// Full-scale count of the battery ADC.
pub const ADC_FULL_SCALE: f64 = 4095.0;

/// ADC reference voltage.
pub const ADC_REFERENCE_V: f64 = 3.3;

/// Battery voltage divider ratio.
pub const BATTERY_DIVIDER: f64 = 2.0;

/// Empirical ADC calibration factor.
pub const ADC_CALIBRATION: f64 = 1.1;

/// Particle count bins in schema order.
const PARTICLE_BINS: [FieldKey; 6] = [
    FieldKey::ParticlesGt0_3,
    FieldKey::ParticlesGt0_5,
    FieldKey::ParticlesGt1_0,
    FieldKey::ParticlesGt2_5,
    FieldKey::ParticlesGt5_0,
    FieldKey::ParticlesGt10_0,
];

/// Acquisition settings for the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderSettings {
    /// Station altitude in meters
    pub altitude_m: f64,
    /// Delay after power-up before reading (particle sensor airflow)
    pub warmup: Duration,
    /// Upper bound on waiting for a particulate frame
    pub poll_timeout: Duration,
    /// Delay between particulate polls
    pub poll_interval: Duration,
}

/// Converts a battery ADC count to volts.
#[must_use]
pub fn battery_voltage(raw: u16) -> f64 {
    (f64::from(raw) / ADC_FULL_SCALE) * BATTERY_DIVIDER * ADC_REFERENCE_V * ADC_CALIBRATION
}

/// Converts a raw UV intensity to the UV index.
#[must_use]
pub fn uv_index(uv: f64) -> i64 {
    (uv / 100.0).round() as i64
}

/// Assembles observations from a [`SensorSuite`].
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    device_id: String,
    settings: BuilderSettings,
}

impl ObservationBuilder {
    pub fn new(device_id: impl Into<String>, settings: BuilderSettings) -> Self {
        Self {
            device_id: device_id.into(),
            settings,
        }
    }

    /// Power up the sensors, read them, and build the cycle's observation.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::SensorUnavailable`] if the sensors cannot be
    /// detected after power-up. Read failures never produce an error.
    pub async fn acquire(
        &self,
        sensors: &mut dyn SensorSuite,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Observation> {
        if let Err(e) = sensors.set_power(true).await {
            warn!("Failed to power sensors: {}", e);
        }

        if let Err(e) = sensors.detect().await {
            if let Err(power_err) = sensors.set_power(false).await {
                warn!("Failed to power down sensors: {}", power_err);
            }
            return Err(match e {
                StationError::SensorUnavailable(_) => e,
                other => StationError::SensorUnavailable(other.to_string()),
            });
        }

        if !self.settings.warmup.is_zero() {
            debug!("Waiting {:?} for sensors to stabilize", self.settings.warmup);
            tokio::time::sleep(self.settings.warmup).await;
        }

        let mut obs = Observation::new(timestamp, self.device_id.clone());

        match sensors.read_environment().await {
            Ok(reading) => self.apply_environment(&mut obs, &reading),
            Err(e) => warn!("Environmental sensor read failed: {}", e),
        }

        match self.wait_for_particulates(sensors).await {
            Ok(frame) => apply_particulates(&mut obs, &frame),
            Err(e) => warn!("Particulate sensor read failed: {}", e),
        }

        match sensors.read_light().await {
            Ok(reading) => apply_light(&mut obs, &reading),
            Err(e) => warn!("Light sensor read failed: {}", e),
        }

        match sensors.read_battery_raw().await {
            Ok(raw) => obs.set(FieldKey::BatteryVoltage, battery_voltage(raw)),
            Err(e) => warn!("Battery read failed: {}", e),
        }

        if let Err(e) = sensors.set_power(false).await {
            warn!("Failed to power down sensors: {}", e);
        }

        info!("Observation built for {}", obs.created_at());
        Ok(obs)
    }

    async fn wait_for_particulates(
        &self,
        sensors: &mut dyn SensorSuite,
    ) -> Result<ParticulateReading> {
        let interval = self.settings.poll_interval;
        let polling = async {
            loop {
                match sensors.poll_particulates().await {
                    Ok(Some(frame)) => return Ok(frame),
                    Ok(None) => tokio::time::sleep(interval).await,
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(self.settings.poll_timeout, polling).await {
            Ok(result) => result,
            Err(_) => Err(StationError::SensorRead(format!(
                "no particulate frame within {:?}",
                self.settings.poll_timeout
            ))),
        }
    }

    fn apply_environment(&self, obs: &mut Observation, reading: &EnvironmentReading) {
        let temperature = reading.temperature_c;
        let humidity = reading.humidity_pct;
        let pressure_hpa = reading.pressure_pa / 100.0;

        obs.set(FieldKey::Temperature, temperature);
        obs.set(FieldKey::Humidity, humidity);
        obs.set(FieldKey::Pressure, pressure_hpa);
        obs.set(
            FieldKey::SeaLevelPressure,
            sea_level_pressure(pressure_hpa, self.settings.altitude_m),
        );
        obs.set(FieldKey::GasResistance, reading.gas_resistance_ohm / 1000.0);

        let hi_f = heat_index(celsius_to_fahrenheit(temperature), humidity);
        obs.set(FieldKey::HeatIndex, fahrenheit_to_celsius(hi_f));

        if humidity > 0.0 {
            obs.set(FieldKey::DewPoint, dew_point(temperature, humidity));
        } else {
            warn!("Humidity {} is not positive, dew point unavailable", humidity);
        }
    }
}

fn apply_particulates(obs: &mut Observation, frame: &ParticulateReading) {
    obs.set(FieldKey::Pm1_0, frame.pm1_0);
    obs.set(FieldKey::Pm2_5, frame.pm2_5);
    obs.set(FieldKey::Pm10_0, frame.pm10_0);
    for (key, count) in PARTICLE_BINS.iter().zip(frame.counts) {
        obs.set(*key, count);
    }
    obs.set(
        FieldKey::AirQualityIndex,
        air_quality_index(f64::from(frame.pm2_5), f64::from(frame.pm10_0)),
    );
}

fn apply_light(obs: &mut Observation, reading: &LightReading) {
    obs.set(FieldKey::LightVisible, reading.visible);
    obs.set(FieldKey::LightIr, reading.ir);
    obs.set(FieldKey::LightUv, reading.uv);
    obs.set(FieldKey::UvIndex, uv_index(reading.uv));
}
