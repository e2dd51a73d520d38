//! # Clock Module
//!
//! Wall-clock capability for the station.
//!
//! This module handles:
//! - Producing the cycle timestamp in station local time
//! - Resynchronizing against an NTP server when the persisted state asks for it
//!
//! Local time follows the configured POSIX TZ string (`"CET-1CEST,M3.5.0,M10.5.0/3"`),
//! daylight saving included. The fixed GMT offset from configuration applies
//! only when the TZ string is `UTC0` or cannot be parsed.

pub mod sntp;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{info, warn};

use crate::error::{Result, StationError};

/// TZ string meaning "no zone rules configured".
pub const UTC_TIMEZONE: &str = "UTC0";

/// Wall-clock capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Clock: Send {
    /// Current local time.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Adjust the clock from `ntp_server` and apply the `timezone` rules.
    async fn sync(&mut self, ntp_server: &str, timezone: &str) -> Result<()>;
}

/// System clock with an SNTP-derived correction.
///
/// The correction survives for the lifetime of the process, the way an RTC
/// keeps its adjustment across deep sleep.
#[derive(Debug, Clone)]
pub struct SystemClock {
    fallback: FixedOffset,
    zone: Option<tz::TimeZone>,
    correction: chrono::Duration,
    ntp_timeout: Duration,
}

impl SystemClock {
    /// Create a clock reporting local time for `timezone`, falling back to
    /// `gmt_offset_sec` from UTC.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::ClockSync`] if the offset is out of range.
    pub fn new(gmt_offset_sec: i32, timezone: &str, ntp_timeout: Duration) -> Result<Self> {
        let fallback = FixedOffset::east_opt(gmt_offset_sec).ok_or_else(|| {
            StationError::ClockSync(format!("invalid GMT offset {}", gmt_offset_sec))
        })?;
        Ok(Self {
            fallback,
            zone: load_zone(timezone),
            correction: chrono::Duration::zero(),
            ntp_timeout,
        })
    }

    /// Current correction applied on top of the system time.
    #[must_use]
    pub fn correction(&self) -> chrono::Duration {
        self.correction
    }

    /// Local UTC offset in effect at `utc`.
    #[must_use]
    pub fn offset_at(&self, utc: DateTime<Utc>) -> FixedOffset {
        self.zone
            .as_ref()
            .and_then(|zone| zone.find_local_time_type(utc.timestamp()).ok())
            .and_then(|local| FixedOffset::east_opt(local.ut_offset()))
            .unwrap_or(self.fallback)
    }
}

/// Zone rules for a TZ string; `None` selects the fixed GMT offset.
fn load_zone(timezone: &str) -> Option<tz::TimeZone> {
    if timezone.is_empty() || timezone == UTC_TIMEZONE {
        return None;
    }
    match tz::TimeZone::from_posix_tz(timezone) {
        Ok(zone) => Some(zone),
        Err(e) => {
            warn!("Invalid timezone '{}', using GMT offset: {}", timezone, e);
            None
        }
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let utc = Utc::now() + self.correction;
        utc.with_timezone(&self.offset_at(utc))
    }

    async fn sync(&mut self, ntp_server: &str, timezone: &str) -> Result<()> {
        info!("Starting NTP sync with {} ({})", ntp_server, timezone);
        self.zone = load_zone(timezone);
        let server_time = sntp::query((ntp_server, sntp::NTP_PORT), self.ntp_timeout).await?;
        self.correction = server_time - Utc::now();
        info!(
            "Clock updated, correction {} ms",
            self.correction.num_milliseconds()
        );
        Ok(())
    }
}
