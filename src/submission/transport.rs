//! # Delivery Transport
//!
//! Request/response delivery of a serialized observation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{Result, StationError};

/// One delivery attempt against a remote endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// POST `body` to `url` and return the HTTP status code.
    ///
    /// Transport-level failures (DNS, TLS, timeout) are errors; any status
    /// the server returns is `Ok`.
    async fn post(&self, url: &str, content_type: &str, body: Bytes) -> Result<u16>;
}

/// HTTPS transport backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    /// Create a transport with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Delivery`] if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weather-station/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StationError::Delivery(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeliveryTransport for HttpsTransport {
    async fn post(&self, url: &str, content_type: &str, body: Bytes) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StationError::Delivery(e.to_string()))?;

        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => debug!("Response {}: {}", status, text),
            Err(e) => debug!("Response {} (unreadable body: {})", status, e),
        }
        Ok(status)
    }
}
