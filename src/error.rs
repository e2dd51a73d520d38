//! # Error Types
//!
//! Custom error types for the weather station using `thiserror`.

use thiserror::Error;

/// Main error type for the weather station
#[derive(Debug, Error)]
pub enum StationError {
    /// Configuration errors (parse and validation)
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A primary sensor did not respond at boot
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// A sensor read failed or timed out mid-cycle
    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    /// Local storage is missing or could not be opened
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Tabular log encoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Payload / state serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The wireless link never came up
    #[error("Network link unavailable after {0} attempts")]
    LinkUnavailable(u32),

    /// The endpoint was unreachable or rejected the request
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Network time synchronization failed
    #[error("Clock sync failed: {0}")]
    ClockSync(String),
}

/// Result type alias for the weather station
pub type Result<T> = std::result::Result<T, StationError>;
