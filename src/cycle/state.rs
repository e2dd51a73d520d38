//! # Station State
//!
//! The only state that survives from one wake cycle to the next: whether the
//! clock needs resynchronizing, and the hour it was last checked.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Persisted cross-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationState {
    pub needs_clock_sync: bool,
    pub last_sync_hour: u32,
}

impl Default for StationState {
    /// State of a station that has never booted: sync on first contact.
    fn default() -> Self {
        Self {
            needs_clock_sync: true,
            last_sync_hour: 0,
        }
    }
}

impl StationState {
    /// Apply the boot rule for a wake at local `hour`.
    ///
    /// An hour lower than the last one seen means the clock wrapped past
    /// midnight, so a daily resync is requested.
    pub fn on_boot(&mut self, hour: u32) {
        if hour < self.last_sync_hour {
            debug!("Day rollover ({} -> {}), clock sync requested", self.last_sync_hour, hour);
            self.needs_clock_sync = true;
        }
        self.last_sync_hour = hour;
    }

    /// Record a successful clock sync.
    pub fn clock_synced(&mut self) {
        self.needs_clock_sync = false;
    }
}

/// JSON file holding the [`StationState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file is a first boot. An unreadable or corrupt file is
    /// logged and also treated as a first boot.
    pub fn load(&self) -> StationState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No station state at {}, first boot", self.path.display());
                return StationState::default();
            }
            Err(e) => {
                warn!("Cannot read station state {}: {}", self.path.display(), e);
                return StationState::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Corrupt station state {}: {}", self.path.display(), e);
            StationState::default()
        })
    }

    /// Persist `state`.
    ///
    /// Directories are never created, so a state file placed on a missing
    /// storage medium fails instead of recreating the mount point.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, state: &StationState) -> Result<()> {
        fs::write(&self.path, serde_json::to_vec(state)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_boot_state() {
        let state = StationState::default();
        assert!(state.needs_clock_sync);
        assert_eq!(state.last_sync_hour, 0);
    }

    #[test]
    fn test_boot_rule_same_day() {
        let mut state = StationState {
            needs_clock_sync: false,
            last_sync_hour: 8,
        };
        state.on_boot(9);
        assert!(!state.needs_clock_sync);
        assert_eq!(state.last_sync_hour, 9);
    }

    #[test]
    fn test_boot_rule_day_rollover() {
        let mut state = StationState {
            needs_clock_sync: false,
            last_sync_hour: 23,
        };
        state.on_boot(0);
        assert!(state.needs_clock_sync);
        assert_eq!(state.last_sync_hour, 0);
    }

    #[test]
    fn test_flag_survives_until_synced() {
        let mut state = StationState::default();
        state.on_boot(5);
        state.on_boot(6);
        assert!(state.needs_clock_sync);

        state.clock_synced();
        state.on_boot(7);
        assert!(!state.needs_clock_sync);
    }

    #[test]
    fn test_store_missing_file_is_first_boot() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), StationState::default());
    }

    #[test]
    fn test_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let state = StationState {
            needs_clock_sync: false,
            last_sync_hour: 14,
        };

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);

        let json = fs::read_to_string(store.path()).unwrap();
        assert!(json.contains("\"needs_clock_sync\":false"));
        assert!(json.contains("\"last_sync_hour\":14"));
    }

    #[test]
    fn test_store_save_does_not_create_directories() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("sdcard");
        let store = StateStore::new(missing.join("state.json"));

        assert!(store.save(&StationState::default()).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_store_corrupt_file_is_first_boot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(StateStore::new(&path).load(), StationState::default());
    }
}
