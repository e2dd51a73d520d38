//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files, and importing
//! a staged `settings.toml` dropped into the data directory.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Result, StationError};
use crate::metrics::thermo::BAROMETRIC_SCALE_HEIGHT_M;
use crate::observation::builder::BuilderSettings;
use crate::submission::{Protocol, SubmissionSettings};

/// Name of the staged configuration file looked up in the data directory
pub const STAGED_SETTINGS_FILE: &str = "settings.toml";

/// Source of the host's stable machine identifier
const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Number of hex digits in a device identifier
const DEVICE_ID_LEN: usize = 12;

/// Largest accepted GMT offset (18 hours)
const MAX_GMT_OFFSET_SEC: i32 = 18 * 3600;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub wifi: WifiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wireless link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WifiConfig {
    #[serde(default)]
    pub ssid: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,

    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,
}

/// Collector endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_protocol")]
    pub protocol: Protocol,

    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Station location
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LocationConfig {
    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    /// Meters above sea level
    #[serde(default)]
    pub altitude: f64,
}

/// Time keeping configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeConfig {
    #[serde(default = "default_ntp_server")]
    pub ntp_server: String,

    /// POSIX TZ string, passed to the clock on sync
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub gmt_offset_sec: i32,

    #[serde(default = "default_ntp_timeout_ms")]
    pub ntp_timeout_ms: u64,
}

/// Wake cadence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_sleep_duration_min")]
    pub sleep_duration_min: u64,

    #[serde(default = "default_min_sleep_secs")]
    pub min_sleep_secs: u64,
}

/// Sensor acquisition configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorsConfig {
    #[serde(default = "default_feed_path")]
    pub feed_path: String,

    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Local storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Kept off the storage medium so saving it never recreates a missing
    /// `data_dir`
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

/// Station identity
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StationConfig {
    /// Empty means derive from the machine identifier
    #[serde(default)]
    pub device_id: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files (stdout only when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_max_connect_attempts() -> u32 { 60 }
fn default_connect_poll_ms() -> u64 { 500 }

fn default_port() -> u16 { 443 }
fn default_protocol() -> Protocol { Protocol::Rest }
fn default_max_delivery_attempts() -> u32 { 2 }
fn default_request_timeout_ms() -> u64 { 10000 }

fn default_ntp_server() -> String { "pool.ntp.org".to_string() }
fn default_timezone() -> String { "UTC0".to_string() }
fn default_ntp_timeout_ms() -> u64 { 5000 }

fn default_sleep_duration_min() -> u64 { 10 }
fn default_min_sleep_secs() -> u64 { 10 }

fn default_feed_path() -> String { "./sensor-feed.json".to_string() }
fn default_warmup_secs() -> u64 { 30 }
fn default_poll_timeout_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 100 }

fn default_data_dir() -> String { "./data".to_string() }
fn default_state_file() -> String { "./.station-state.json".to_string() }

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            max_connect_attempts: default_max_connect_attempts(),
            connect_poll_ms: default_connect_poll_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: String::new(),
            port: default_port(),
            protocol: default_protocol(),
            max_delivery_attempts: default_max_delivery_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ntp_server: default_ntp_server(),
            timezone: default_timezone(),
            gmt_offset_sec: 0,
            ntp_timeout_ms: default_ntp_timeout_ms(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sleep_duration_min: default_sleep_duration_min(),
            min_sleep_secs: default_min_sleep_secs(),
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            feed_path: default_feed_path(),
            warmup_secs: default_warmup_secs(),
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_file: default_state_file(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> StationError {
    StationError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use weather_station::config::Config;
    ///
    /// let config = Config::load("config/station.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.schedule.sleep_duration_min == 0 {
            return Err(invalid("sleep_duration_min must be greater than 0"));
        }

        if self.wifi.max_connect_attempts == 0 {
            return Err(invalid("max_connect_attempts must be greater than 0"));
        }

        if self.server.max_delivery_attempts == 0 {
            return Err(invalid("max_delivery_attempts must be greater than 0"));
        }

        if self.sensors.poll_timeout_ms == 0 {
            return Err(invalid("poll_timeout_ms must be greater than 0"));
        }

        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(invalid("latitude must be between -90 and 90"));
        }

        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(invalid("longitude must be between -180 and 180"));
        }

        // Sea-level reduction divides by (1 - altitude / 44330)
        if self.location.altitude >= BAROMETRIC_SCALE_HEIGHT_M {
            return Err(invalid(format!(
                "altitude must be below {} m",
                BAROMETRIC_SCALE_HEIGHT_M
            )));
        }

        if self.time.gmt_offset_sec.abs() > MAX_GMT_OFFSET_SEC {
            return Err(invalid("gmt_offset_sec must be within +/- 18 hours"));
        }

        if self.storage.data_dir.is_empty() {
            return Err(invalid("storage data_dir cannot be empty"));
        }

        if self.server.protocol == Protocol::Rest {
            if self.server.url.is_empty() {
                return Err(invalid("server url cannot be empty when protocol is REST"));
            }
            self.endpoint()?;
        }

        Ok(())
    }

    /// Collector URL with the configured port applied when the URL has none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL does not parse.
    pub fn endpoint(&self) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.server.url)
            .map_err(|e| invalid(format!("invalid server url '{}': {}", self.server.url, e)))?;
        if url.port().is_none() && url.set_port(Some(self.server.port)).is_err() {
            return Err(invalid(format!("server url '{}' cannot carry a port", self.server.url)));
        }
        Ok(url.to_string())
    }

    /// Replace the configuration at `config_path` with a staged
    /// `settings.toml` from the data directory, if one exists.
    ///
    /// The staged file must load and validate before it replaces the active
    /// configuration; it is then deleted. An invalid staged file is left in
    /// place and ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(config))` - The imported configuration
    /// * `Ok(None)` - Nothing staged, or the staged file was invalid
    ///
    /// # Errors
    ///
    /// Returns error if the active configuration cannot be overwritten or the
    /// staged file cannot be removed.
    pub fn import_staged<P: AsRef<Path>>(&self, config_path: P) -> Result<Option<Config>> {
        let staged = self.staged_settings_path();
        if !staged.is_file() {
            return Ok(None);
        }

        let imported = match Config::load(&staged) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring staged settings {}: {}", staged.display(), e);
                return Ok(None);
            }
        };

        fs::copy(&staged, config_path.as_ref())?;
        fs::remove_file(&staged)?;
        info!(
            "Imported staged settings into {}",
            config_path.as_ref().display()
        );
        Ok(Some(imported))
    }

    /// Location of a staged settings file.
    #[must_use]
    pub fn staged_settings_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join(STAGED_SETTINGS_FILE)
    }

    /// Device identifier: the configured one, or derived from the machine id.
    pub fn device_id(&self) -> String {
        if !self.station.device_id.is_empty() {
            return self.station.device_id.clone();
        }
        match fs::read_to_string(MACHINE_ID_PATH) {
            Ok(machine_id) => derive_device_id(&machine_id).unwrap_or_else(|| {
                warn!("Machine id is malformed, using a zero device id");
                "0".repeat(DEVICE_ID_LEN)
            }),
            Err(e) => {
                warn!("Cannot read {}: {}", MACHINE_ID_PATH, e);
                "0".repeat(DEVICE_ID_LEN)
            }
        }
    }

    /// Acquisition settings for the observation builder.
    pub fn builder_settings(&self) -> BuilderSettings {
        BuilderSettings {
            altitude_m: self.location.altitude,
            warmup: Duration::from_secs(self.sensors.warmup_secs),
            poll_timeout: Duration::from_millis(self.sensors.poll_timeout_ms),
            poll_interval: Duration::from_millis(self.sensors.poll_interval_ms),
        }
    }

    /// Submission settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if REST is selected and the server URL
    /// is invalid.
    pub fn submission_settings(&self) -> Result<SubmissionSettings> {
        let endpoint = match self.server.protocol {
            Protocol::Rest => self.endpoint()?,
            Protocol::Mqtt => self.server.url.clone(),
        };
        Ok(SubmissionSettings {
            ssid: self.wifi.ssid.clone(),
            password: self.wifi.password.clone(),
            max_connect_attempts: self.wifi.max_connect_attempts,
            connect_poll: Duration::from_millis(self.wifi.connect_poll_ms),
            protocol: self.server.protocol,
            endpoint,
            api_key: self.server.api_key.clone(),
            max_delivery_attempts: self.server.max_delivery_attempts,
            ntp_server: self.time.ntp_server.clone(),
            timezone: self.time.timezone.clone(),
        })
    }

    /// Configured wake interval.
    #[must_use]
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.sleep_duration_min * 60)
    }

    /// Shortest sleep ever requested.
    #[must_use]
    pub fn min_sleep(&self) -> Duration {
        Duration::from_secs(self.schedule.min_sleep_secs)
    }
}

/// First 12 hex digits of a machine id, upper-cased.
fn derive_device_id(machine_id: &str) -> Option<String> {
    let hex: String = machine_id
        .trim()
        .chars()
        .filter(char::is_ascii_hexdigit)
        .take(DEVICE_ID_LEN)
        .collect();
    (hex.len() == DEVICE_ID_LEN).then(|| hex.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_valid_config() -> Config {
        Config {
            server: ServerConfig {
                api_key: "token".to_string(),
                url: "https://collector.example.org/api/observations".to_string(),
                ..ServerConfig::default()
            },
            location: LocationConfig {
                latitude: 47.37,
                longitude: 8.54,
                altitude: 408.0,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.wifi.max_connect_attempts, 60);
        assert_eq!(config.wifi.connect_poll_ms, 500);
        assert_eq!(config.server.port, 443);
        assert_eq!(config.server.protocol, Protocol::Rest);
        assert_eq!(config.server.max_delivery_attempts, 2);
        assert_eq!(config.time.ntp_server, "pool.ntp.org");
        assert_eq!(config.time.timezone, "UTC0");
        assert_eq!(config.schedule.sleep_duration_min, 10);
        assert_eq!(config.sensors.warmup_secs, 30);
        assert_eq!(config.storage.data_dir, "./data");
        assert!(!Path::new(&config.storage.state_file).starts_with(&config.storage.data_dir));
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_valid_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_rest_requires_url() {
        // Defaults leave the URL empty
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_mqtt_allows_empty_url() {
        let mut config = Config::default();
        config.server.protocol = Protocol::Mqtt;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = create_valid_config();
        config.server.url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sleep_duration() {
        let mut config = create_valid_config();
        config.schedule.sleep_duration_min = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_attempt_counts() {
        let mut config = create_valid_config();
        config.wifi.max_connect_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.server.max_delivery_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_poll_timeout() {
        let mut config = create_valid_config();
        config.sensors.poll_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_coordinates() {
        let mut config = create_valid_config();
        config.location.latitude = 90.5;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.location.longitude = -181.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_altitude() {
        let mut config = create_valid_config();
        config.location.altitude = 44330.0;
        assert!(config.validate().is_err());

        config.location.altitude = 44329.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_gmt_offset() {
        let mut config = create_valid_config();
        config.time.gmt_offset_sec = 19 * 3600;
        assert!(config.validate().is_err());

        config.time.gmt_offset_sec = -18 * 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_data_dir() {
        let mut config = create_valid_config();
        config.storage.data_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_applies_port() {
        let mut config = create_valid_config();
        config.server.url = "https://collector.example.org/api".to_string();
        config.server.port = 8443;
        assert_eq!(config.endpoint().unwrap(), "https://collector.example.org:8443/api");

        // An explicit port in the URL wins
        config.server.url = "https://collector.example.org:9000/api".to_string();
        assert_eq!(config.endpoint().unwrap(), "https://collector.example.org:9000/api");
    }

    #[test]
    fn test_endpoint_default_port_is_implicit() {
        let config = create_valid_config();
        assert_eq!(
            config.endpoint().unwrap(),
            "https://collector.example.org/api/observations"
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[wifi]
ssid = "station-ap"
password = "hunter2"

[server]
api_key = "abc"
url = "https://collector.example.org/api"
protocol = "REST"

[location]
latitude = 47.37
longitude = 8.54
altitude = 408.0

[time]
gmt_offset_sec = 3600

[schedule]
sleep_duration_min = 5
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.wifi.ssid, "station-ap");
        assert_eq!(config.location.altitude, 408.0);
        assert_eq!(config.time.gmt_offset_sec, 3600);
        assert_eq!(config.sleep_interval(), Duration::from_secs(300));
        // Absent sections fall back to defaults
        assert_eq!(config.sensors.poll_interval_ms, 100);
        assert_eq!(config.min_sleep(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_rejects_unknown_protocol() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nurl = \"https://x.org\"\nprotocol = \"FTP\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(StationError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/station.toml"),
            Err(StationError::Io(_))
        ));
    }

    fn config_in(dir: &TempDir) -> Config {
        let mut config = create_valid_config();
        config.storage.data_dir = dir.path().to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_import_staged_replaces_active_config() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("station.toml");
        fs::write(&active, "[server]\nurl = \"https://old.example.org\"\n").unwrap();
        let staged_content = "[server]\nurl = \"https://new.example.org\"\napi_key = \"new\"\n";
        fs::write(dir.path().join(STAGED_SETTINGS_FILE), staged_content).unwrap();

        let config = config_in(&dir);
        let imported = config.import_staged(&active).unwrap().unwrap();

        assert_eq!(imported.server.url, "https://new.example.org");
        assert_eq!(imported.server.api_key, "new");
        assert_eq!(fs::read_to_string(&active).unwrap(), staged_content);
        assert!(!config.staged_settings_path().exists());
    }

    #[test]
    fn test_import_staged_invalid_is_left_in_place() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("station.toml");
        fs::write(&active, "[server]\nurl = \"https://old.example.org\"\n").unwrap();
        fs::write(
            dir.path().join(STAGED_SETTINGS_FILE),
            "[schedule]\nsleep_duration_min = 0\n",
        )
        .unwrap();

        let config = config_in(&dir);
        assert!(config.import_staged(&active).unwrap().is_none());
        assert!(config.staged_settings_path().exists());
        assert_eq!(
            fs::read_to_string(&active).unwrap(),
            "[server]\nurl = \"https://old.example.org\"\n"
        );
    }

    #[test]
    fn test_import_staged_nothing_staged() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(config
            .import_staged(dir.path().join("station.toml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_device_id_override() {
        let mut config = create_valid_config();
        config.station.device_id = "CAFEBABE0001".to_string();
        assert_eq!(config.device_id(), "CAFEBABE0001");
    }

    #[test]
    fn test_derive_device_id() {
        assert_eq!(
            derive_device_id("4c4c4544003957108052b4c04f384833\n").as_deref(),
            Some("4C4C45440039")
        );
        assert_eq!(derive_device_id("abc"), None);
        assert_eq!(derive_device_id(""), None);
    }

    #[test]
    fn test_derived_device_id_shape() {
        let id = Config::default().device_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_submission_settings() {
        let mut config = create_valid_config();
        config.server.port = 8443;
        config.wifi.connect_poll_ms = 250;

        let settings = config.submission_settings().unwrap();
        assert_eq!(settings.endpoint, "https://collector.example.org:8443/api/observations");
        assert_eq!(settings.connect_poll, Duration::from_millis(250));
        assert_eq!(settings.max_delivery_attempts, 2);
        assert_eq!(settings.api_key, "token");
    }

    #[test]
    fn test_builder_settings() {
        let config = create_valid_config();
        let settings = config.builder_settings();
        assert_eq!(settings.altitude_m, 408.0);
        assert_eq!(settings.warmup, Duration::from_secs(30));
        assert_eq!(settings.poll_timeout, Duration::from_millis(5000));
    }
}
