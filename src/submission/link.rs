//! # Network Link
//!
//! The best-effort wireless link the station brings up for each submission
//! and tears down afterwards.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;

/// Capability over the station's network interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkLink: Send {
    /// Start associating with the access point.
    async fn begin(&mut self, ssid: &str, password: &str) -> Result<()>;

    /// Whether the link is up.
    async fn is_connected(&mut self) -> bool;

    /// Tear the interface down.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Link that relies on the host operating system's network configuration.
#[derive(Debug, Default)]
pub struct HostLink {
    up: bool,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    async fn begin(&mut self, ssid: &str, _password: &str) -> Result<()> {
        if ssid.is_empty() {
            info!("Using host network");
        } else {
            info!("Using host network (configured SSID {})", ssid);
        }
        self.up = true;
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.up
    }

    async fn disconnect(&mut self) -> Result<()> {
        debug!("Releasing host network");
        self.up = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_link_lifecycle() {
        let mut link = HostLink::new();
        assert!(!link.is_connected().await);

        link.begin("station-ap", "hunter2").await.unwrap();
        assert!(link.is_connected().await);

        link.disconnect().await.unwrap();
        assert!(!link.is_connected().await);
    }
}
