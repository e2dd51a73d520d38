//! # Sensor Feed
//!
//! [`SensorSuite`] backed by a JSON document of raw readings.
//!
//! The feed file is re-read on every access, so an external acquisition
//! process (or a test harness) can update it between cycles. Each section is
//! optional; a missing section reads as a sensor failure.
//!
//! ```json
//! {
//!   "environment": { "temperature_c": 21.4, "humidity_pct": 48.0,
//!                    "pressure_pa": 101325.0, "gas_resistance_ohm": 52000.0 },
//!   "light": { "visible": 260.0, "ir": 250.0, "uv": 120.0 },
//!   "particulates": { "pm1_0": 3, "pm2_5": 5, "pm10_0": 7,
//!                     "counts": [540, 160, 30, 4, 1, 0] },
//!   "battery_raw": 2350
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{EnvironmentReading, LightReading, ParticulateReading, SensorSuite};
use crate::error::{Result, StationError};

#[derive(Debug, Clone, Default, Deserialize)]
struct Feed {
    environment: Option<EnvironmentReading>,
    light: Option<LightReading>,
    particulates: Option<ParticulateReading>,
    battery_raw: Option<u16>,
}

/// Sensor suite reading raw values from a JSON feed file.
#[derive(Debug)]
pub struct FeedSensors {
    path: PathBuf,
    powered: bool,
}

impl FeedSensors {
    /// Create a feed reader for the given file.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            powered: false,
        }
    }

    /// Whether the (virtual) sensor rail is on.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    async fn load(&self) -> Result<Feed> {
        if !self.powered {
            return Err(StationError::SensorRead("sensor rail is off".to_string()));
        }
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StationError::SensorRead(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let feed = serde_json::from_str(&contents)
            .map_err(|e| StationError::SensorRead(format!("Invalid sensor feed: {}", e)))?;
        Ok(feed)
    }
}

fn missing(sensor: &str) -> StationError {
    StationError::SensorRead(format!("{} not present in feed", sensor))
}

#[async_trait]
impl SensorSuite for FeedSensors {
    async fn set_power(&mut self, on: bool) -> Result<()> {
        debug!("Sensor rail {}", if on { "on" } else { "off" });
        self.powered = on;
        Ok(())
    }

    async fn detect(&mut self) -> Result<()> {
        let feed = self
            .load()
            .await
            .map_err(|e| StationError::SensorUnavailable(e.to_string()))?;
        if feed.environment.is_none() {
            return Err(StationError::SensorUnavailable(
                "environmental sensor not found".to_string(),
            ));
        }
        if feed.light.is_none() {
            return Err(StationError::SensorUnavailable(
                "light sensor not found".to_string(),
            ));
        }
        Ok(())
    }

    async fn read_environment(&mut self) -> Result<EnvironmentReading> {
        self.load().await?.environment.ok_or_else(|| missing("environment"))
    }

    async fn read_light(&mut self) -> Result<LightReading> {
        self.load().await?.light.ok_or_else(|| missing("light"))
    }

    async fn poll_particulates(&mut self) -> Result<Option<ParticulateReading>> {
        // A frame with no >0.3µm count is treated as "not ready yet".
        Ok(self
            .load()
            .await?
            .particulates
            .filter(|frame| frame.counts[0] > 0))
    }

    async fn read_battery_raw(&mut self) -> Result<u16> {
        self.load().await?.battery_raw.ok_or_else(|| missing("battery"))
    }
}
