//! # Wake Cycle
//!
//! One full run from wake to sleep:
//!
//! 1. Start the cycle timer and apply the boot rule to the persisted state
//! 2. Acquire an [`Observation`] from the sensors
//! 3. Append it to the local daily log
//! 4. Submit it (independent of whether it was recorded)
//! 5. Compute the next sleep, or request a restart if the link never came up

pub mod scheduler;
pub mod state;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Timelike;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, StationError};
use crate::observation::builder::ObservationBuilder;
use crate::observation::Observation;
use crate::recorder::DailyLogRecorder;
use crate::sensors::SensorSuite;
use crate::submission::{DeliveryOutcome, DeliveryTransport, NetworkLink, SubmissionClient};

use scheduler::{sleep_duration, CycleTimer};
pub use state::{StateStore, StationState};

/// What the device does once the cycle is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Suspend for the given duration, then run the next cycle
    Sleep(Duration),
    /// Hard restart of the device
    Restart,
}

/// Outcome of one wake cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub observation: Observation,
    /// Log file the observation was appended to, if recording succeeded
    pub recorded: Option<PathBuf>,
    /// `None` if submission did not get as far as delivery
    pub delivery: Option<DeliveryOutcome>,
    pub next_state: StationState,
    pub next_action: NextAction,
}

/// Device collaborators the station drives.
pub struct Collaborators {
    pub sensors: Box<dyn SensorSuite>,
    pub clock: Box<dyn Clock>,
    pub link: Box<dyn NetworkLink>,
    pub transport: Box<dyn DeliveryTransport>,
}

/// The per-cycle measurement pipeline.
pub struct Station {
    builder: ObservationBuilder,
    recorder: DailyLogRecorder,
    submission: SubmissionClient,
    sensors: Box<dyn SensorSuite>,
    clock: Box<dyn Clock>,
    interval: Duration,
    min_sleep: Duration,
}

impl Station {
    /// Assemble a station from configuration and its collaborators.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the submission endpoint is invalid.
    pub fn new(config: &Config, parts: Collaborators) -> Result<Self> {
        let device_id = config.device_id();
        info!("Device id {}", device_id);

        Ok(Self {
            builder: ObservationBuilder::new(device_id, config.builder_settings()),
            recorder: DailyLogRecorder::new(&config.storage.data_dir),
            submission: SubmissionClient::new(
                config.submission_settings()?,
                parts.link,
                parts.transport,
            ),
            sensors: parts.sensors,
            clock: parts.clock,
            interval: config.sleep_interval(),
            min_sleep: config.min_sleep(),
        })
    }

    /// Run one wake cycle starting from the persisted `state`.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::SensorUnavailable`] if the sensors cannot be
    /// detected; the station halts in that case. Every other failure is
    /// logged and reflected in the [`CycleReport`].
    pub async fn run_cycle(&mut self, state: StationState) -> Result<CycleReport> {
        let timer = CycleTimer::start();
        let now = self.clock.now();

        let mut state = state;
        state.on_boot(now.hour());

        let observation = self.builder.acquire(self.sensors.as_mut(), now).await?;
        observation.log_summary();

        let recorded = match self.recorder.record(&observation).await {
            Ok(path) => {
                info!("Observation recorded to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to record observation: {}", e);
                None
            }
        };

        let submission = self
            .submission
            .submit(&observation, self.clock.as_mut(), state.needs_clock_sync)
            .await;

        let (delivery, restart) = match submission {
            Ok(report) => {
                if report.clock_synced {
                    state.clock_synced();
                }
                (Some(report.delivery), false)
            }
            Err(StationError::LinkUnavailable(attempts)) => {
                error!("Network link unavailable after {} attempts, restarting", attempts);
                (None, true)
            }
            Err(e) => {
                error!("Submission failed: {}", e);
                (None, false)
            }
        };

        let next_action = if restart {
            NextAction::Restart
        } else {
            NextAction::Sleep(sleep_duration(self.interval, timer.elapsed(), self.min_sleep))
        };

        Ok(CycleReport {
            observation,
            recorded,
            delivery,
            next_state: state,
            next_action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::{LocationConfig, ServerConfig};
    use crate::observation::schema::FieldKey;
    use crate::sensors::feed::FeedSensors;
    use crate::submission::link::MockNetworkLink;
    use crate::submission::transport::MockDeliveryTransport;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    const FEED: &str = r#"{
        "environment": { "temperature_c": 21.4, "humidity_pct": 48.0,
                         "pressure_pa": 101325.0, "gas_resistance_ohm": 52000.0 },
        "light": { "visible": 260.0, "ir": 250.0, "uv": 120.0 },
        "particulates": { "pm1_0": 3, "pm2_5": 5, "pm10_0": 7,
                          "counts": [540, 160, 30, 4, 1, 0] },
        "battery_raw": 2350
    }"#;

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let feed = dir.path().join("feed.json");
            fs::write(&feed, FEED).unwrap();
            let data_dir = dir.path().join("data");
            fs::create_dir(&data_dir).unwrap();

            let mut config = Config {
                server: ServerConfig {
                    api_key: "token".to_string(),
                    url: "https://collector.example.org/api".to_string(),
                    ..ServerConfig::default()
                },
                location: LocationConfig {
                    latitude: 47.37,
                    longitude: 8.54,
                    altitude: 408.0,
                },
                ..Config::default()
            };
            config.station.device_id = "A1B2C3D4E5F6".to_string();
            config.sensors.feed_path = feed.to_string_lossy().into_owned();
            config.sensors.warmup_secs = 0;
            config.wifi.max_connect_attempts = 3;
            config.wifi.connect_poll_ms = 0;
            config.storage.data_dir = data_dir.to_string_lossy().into_owned();
            config.schedule.sleep_duration_min = 5;
            Self { dir, config }
        }

        fn station(
            &self,
            clock: MockClock,
            link: MockNetworkLink,
            transport: MockDeliveryTransport,
        ) -> Station {
            Station::new(
                &self.config,
                Collaborators {
                    sensors: Box::new(FeedSensors::new(&self.config.sensors.feed_path)),
                    clock: Box::new(clock),
                    link: Box::new(link),
                    transport: Box::new(transport),
                },
            )
            .unwrap()
        }
    }

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, hour, 15, 0)
            .unwrap()
    }

    fn clock_at(hour: u32, expected_syncs: usize) -> MockClock {
        let now = at(hour);
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || now);
        clock
            .expect_sync()
            .times(expected_syncs)
            .returning(|_, _| Ok(()));
        clock
    }

    fn link_up() -> MockNetworkLink {
        let mut link = MockNetworkLink::new();
        link.expect_begin().returning(|_, _| Ok(()));
        link.expect_is_connected().returning(|| true);
        link.expect_disconnect().times(1).returning(|| Ok(()));
        link
    }

    fn transport_status(status: u16, times: usize) -> MockDeliveryTransport {
        let mut transport = MockDeliveryTransport::new();
        transport
            .expect_post()
            .times(times)
            .returning(move |_, _, _| Ok(status));
        transport
    }

    fn assert_sleeps_about(action: NextAction, interval: Duration) {
        match action {
            NextAction::Sleep(d) => {
                assert!(d <= interval);
                assert!(d > interval - Duration::from_secs(10), "slept {:?}", d);
            }
            NextAction::Restart => panic!("unexpected restart"),
        }
    }

    #[tokio::test]
    async fn test_first_boot_cycle() {
        let fixture = Fixture::new();
        let mut station = fixture.station(clock_at(12, 1), link_up(), transport_status(200, 1));

        let report = station.run_cycle(StationState::default()).await.unwrap();

        assert_eq!(report.observation.timestamp(), at(12));
        assert_eq!(report.observation.get(FieldKey::Temperature).as_f64(), 21.4);
        assert_eq!(report.delivery, Some(DeliveryOutcome::Delivered { attempts: 1 }));
        assert_eq!(
            report.next_state,
            StationState {
                needs_clock_sync: false,
                last_sync_hour: 12,
            }
        );
        assert_sleeps_about(report.next_action, Duration::from_secs(300));

        let path = report.recorded.unwrap();
        assert!(path.ends_with("2024/06/2024-06-01.csv"));
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_no_sync_when_not_needed() {
        let fixture = Fixture::new();
        let mut station = fixture.station(clock_at(12, 0), link_up(), transport_status(200, 1));
        let state = StationState {
            needs_clock_sync: false,
            last_sync_hour: 11,
        };

        let report = station.run_cycle(state).await.unwrap();

        assert!(!report.next_state.needs_clock_sync);
        assert_eq!(report.next_state.last_sync_hour, 12);
    }

    #[tokio::test]
    async fn test_day_rollover_triggers_sync() {
        let fixture = Fixture::new();
        let mut station = fixture.station(clock_at(0, 1), link_up(), transport_status(200, 1));
        let state = StationState {
            needs_clock_sync: false,
            last_sync_hour: 23,
        };

        let report = station.run_cycle(state).await.unwrap();

        assert!(!report.next_state.needs_clock_sync);
        assert_eq!(report.next_state.last_sync_hour, 0);
    }

    #[tokio::test]
    async fn test_exhausted_delivery_still_sleeps() {
        let fixture = Fixture::new();
        let mut station = fixture.station(clock_at(12, 1), link_up(), transport_status(503, 2));

        let report = station.run_cycle(StationState::default()).await.unwrap();

        assert_eq!(report.delivery, Some(DeliveryOutcome::Exhausted { attempts: 2 }));
        assert!(report.recorded.is_some());
        assert_sleeps_about(report.next_action, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_link_unavailable_requests_restart() {
        let fixture = Fixture::new();
        let mut link = MockNetworkLink::new();
        link.expect_begin().returning(|_, _| Ok(()));
        link.expect_is_connected().returning(|| false);
        link.expect_disconnect().returning(|| Ok(()));

        let mut station = fixture.station(clock_at(12, 0), link, transport_status(200, 0));
        let report = station.run_cycle(StationState::default()).await.unwrap();

        assert_eq!(report.next_action, NextAction::Restart);
        assert_eq!(report.delivery, None);
        // Recorded before submission, so the data is kept
        assert!(report.recorded.is_some());
        assert!(report.next_state.needs_clock_sync);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_submission() {
        let mut fixture = Fixture::new();
        fixture.config.storage.data_dir = fixture
            .dir
            .path()
            .join("unmounted")
            .to_string_lossy()
            .into_owned();
        let mut station = fixture.station(clock_at(12, 1), link_up(), transport_status(200, 1));

        let report = station.run_cycle(StationState::default()).await.unwrap();

        assert!(report.recorded.is_none());
        assert_eq!(report.delivery, Some(DeliveryOutcome::Delivered { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_storage_stays_unavailable_across_cycles() {
        let mut fixture = Fixture::new();
        let defaults = Config::default();
        let data_dir = fixture.dir.path().join(&defaults.storage.data_dir);
        fs::remove_dir_all(&data_dir).unwrap();
        fixture.config.storage.data_dir = data_dir.to_string_lossy().into_owned();
        let store = StateStore::new(fixture.dir.path().join(&defaults.storage.state_file));

        let mut link = MockNetworkLink::new();
        link.expect_begin().returning(|_, _| Ok(()));
        link.expect_is_connected().returning(|| true);
        link.expect_disconnect().times(2).returning(|| Ok(()));
        let mut station = fixture.station(clock_at(12, 1), link, transport_status(200, 2));

        let mut state = store.load();
        for _ in 0..2 {
            let report = station.run_cycle(state).await.unwrap();
            assert!(report.recorded.is_none());
            assert!(report.delivery.unwrap().is_delivered());

            state = report.next_state;
            store.save(&state).unwrap();
            assert!(!data_dir.exists());
        }
        assert_eq!(store.load(), state);
    }

    #[tokio::test]
    async fn test_missing_sensors_are_fatal() {
        let fixture = Fixture::new();
        fs::remove_file(&fixture.config.sensors.feed_path).unwrap();

        let mut link = MockNetworkLink::new();
        link.expect_begin().never();
        let mut station = fixture.station(clock_at(12, 0), link, transport_status(200, 0));

        let result = station.run_cycle(StationState::default()).await;
        assert!(matches!(result, Err(StationError::SensorUnavailable(_))));
    }

    #[tokio::test]
    async fn test_consecutive_cycles_share_log() {
        let fixture = Fixture::new();
        let mut clock = MockClock::new();
        clock.expect_now().returning(|| at(12));
        clock.expect_sync().returning(|_, _| Ok(()));
        let mut link = MockNetworkLink::new();
        link.expect_begin().returning(|_, _| Ok(()));
        link.expect_is_connected().returning(|| true);
        link.expect_disconnect().times(2).returning(|| Ok(()));

        let mut station = fixture.station(clock, link, transport_status(200, 2));
        let first = station.run_cycle(StationState::default()).await.unwrap();
        let second = station.run_cycle(first.next_state).await.unwrap();

        assert_eq!(first.recorded, second.recorded);
        let contents = fs::read_to_string(second.recorded.unwrap()).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
