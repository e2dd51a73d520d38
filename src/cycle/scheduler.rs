//! # Cycle Scheduler
//!
//! Keeps the wake cadence fixed: the sleep after a cycle is the configured
//! interval minus the time the cycle took.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// Measures the wall time of one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleTimer {
    started: Instant,
}

impl CycleTimer {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Sleep remaining in `interval` after a cycle that took `elapsed`.
///
/// Never returns less than `min_sleep`. A cycle that overran its interval
/// is logged and gets `min_sleep`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use weather_station::cycle::scheduler::sleep_duration;
///
/// let sleep = sleep_duration(
///     Duration::from_secs(5 * 60),
///     Duration::from_secs(12),
///     Duration::from_secs(10),
/// );
/// assert_eq!(sleep, Duration::from_secs(288));
/// ```
#[must_use]
pub fn sleep_duration(interval: Duration, elapsed: Duration, min_sleep: Duration) -> Duration {
    let remaining = interval.saturating_sub(elapsed);
    if remaining < min_sleep {
        warn!(
            "Cycle took {:?} of a {:?} interval, sleeping minimum {:?}",
            elapsed, interval, min_sleep
        );
        return min_sleep;
    }
    remaining
}
