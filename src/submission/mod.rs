//! # Submission Client
//!
//! Brings the network link up, optionally resynchronizes the clock, delivers
//! the cycle's observation and tears the link down again.
//!
//! Delivery is best-effort: a failed or exhausted delivery is reported in the
//! [`SubmissionReport`] and never aborts the cycle. Only a link that never
//! comes up is an error, because the station must restart in that case.

pub mod link;
pub mod payload;
pub mod transport;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{Result, StationError};
use crate::observation::Observation;

pub use link::{HostLink, NetworkLink};
pub use transport::{DeliveryTransport, HttpsTransport};

/// The only status accepted as a successful delivery.
const HTTP_OK: u16 = 200;

/// Wire protocol used to deliver observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// HTTPS POST of a JSON document
    Rest,
    /// Publish/subscribe delivery (reserved)
    Mqtt,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Rest => write!(f, "REST"),
            Protocol::Mqtt => write!(f, "MQTT"),
        }
    }
}

/// Result of the delivery step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint accepted the observation on attempt `attempts`
    Delivered { attempts: u32 },
    /// Every attempt failed; the observation stays in the local log only
    Exhausted { attempts: u32 },
    /// The configured protocol has no delivery implementation
    Unsupported(Protocol),
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReport {
    pub delivery: DeliveryOutcome,
    /// True if the clock was resynchronized during this submission
    pub clock_synced: bool,
}

/// Submission parameters, resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionSettings {
    pub ssid: String,
    pub password: String,
    pub max_connect_attempts: u32,
    pub connect_poll: Duration,
    pub protocol: Protocol,
    /// Endpoint URL with the configured port applied
    pub endpoint: String,
    pub api_key: String,
    pub max_delivery_attempts: u32,
    pub ntp_server: String,
    pub timezone: String,
}

/// Delivers observations over a [`NetworkLink`] and [`DeliveryTransport`].
pub struct SubmissionClient {
    settings: SubmissionSettings,
    link: Box<dyn NetworkLink>,
    transport: Box<dyn DeliveryTransport>,
}

impl SubmissionClient {
    pub fn new(
        settings: SubmissionSettings,
        link: Box<dyn NetworkLink>,
        transport: Box<dyn DeliveryTransport>,
    ) -> Self {
        Self {
            settings,
            link,
            transport,
        }
    }

    /// Submit `obs`, syncing `clock` first when `needs_clock_sync` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::LinkUnavailable`] if the link does not come up
    /// within the configured number of polls. Delivery failures are reported
    /// through [`DeliveryOutcome`] instead.
    pub async fn submit(
        &mut self,
        obs: &Observation,
        clock: &mut dyn Clock,
        needs_clock_sync: bool,
    ) -> Result<SubmissionReport> {
        self.connect().await?;

        let clock_synced = needs_clock_sync && self.sync_clock(clock).await;

        let delivery = match self.settings.protocol {
            Protocol::Rest => self.deliver(obs).await,
            Protocol::Mqtt => {
                warn!("Protocol MQTT is not supported, observation kept locally");
                Ok(DeliveryOutcome::Unsupported(Protocol::Mqtt))
            }
        };

        if let Err(e) = self.link.disconnect().await {
            warn!("Failed to tear down network link: {}", e);
        }

        Ok(SubmissionReport {
            delivery: delivery?,
            clock_synced,
        })
    }

    async fn connect(&mut self) -> Result<()> {
        let attempts = self.settings.max_connect_attempts;
        info!("Connecting to network {}", self.settings.ssid);

        if let Err(e) = self
            .link
            .begin(&self.settings.ssid, &self.settings.password)
            .await
        {
            warn!("Failed to start network link: {}", e);
        }

        for poll in 1..=attempts {
            if self.link.is_connected().await {
                info!("Network link up after {} poll(s)", poll);
                return Ok(());
            }
            debug!("Network link down ({}/{})", poll, attempts);
            tokio::time::sleep(self.settings.connect_poll).await;
        }

        error!("Network link unavailable after {} attempts", attempts);
        if let Err(e) = self.link.disconnect().await {
            debug!("Teardown after failed connect: {}", e);
        }
        Err(StationError::LinkUnavailable(attempts))
    }

    async fn sync_clock(&mut self, clock: &mut dyn Clock) -> bool {
        match clock
            .sync(&self.settings.ntp_server, &self.settings.timezone)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Clock sync failed, retrying next cycle: {}", e);
                false
            }
        }
    }

    async fn deliver(&self, obs: &Observation) -> Result<DeliveryOutcome> {
        let body = payload::encode(obs, &self.settings.api_key)?;
        let attempts = self.settings.max_delivery_attempts;

        for attempt in 1..=attempts {
            info!("Delivery attempt {}/{}", attempt, attempts);
            match self
                .transport
                .post(&self.settings.endpoint, payload::CONTENT_TYPE, body.clone())
                .await
            {
                Ok(HTTP_OK) => {
                    info!("Observation delivered (HTTP {})", HTTP_OK);
                    return Ok(DeliveryOutcome::Delivered { attempts: attempt });
                }
                Ok(status) => warn!("Endpoint rejected observation (HTTP {})", status),
                Err(e) => warn!("Delivery failed: {}", e),
            }
        }

        warn!("Delivery exhausted after {} attempts", attempts);
        Ok(DeliveryOutcome::Exhausted { attempts })
    }
}
