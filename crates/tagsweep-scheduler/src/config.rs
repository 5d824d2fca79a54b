//! Configuration for the scheduler.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the persisted state file inside the state directory.
pub const STATE_FILE: &str = "latest_cleanup.json";

/// Name of the history log inside the state directory.
pub const HISTORY_FILE: &str = "history.log";

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Directory holding the state file and the history log.
    pub state_dir: PathBuf,

    /// Pause between two ticks in watch mode.
    pub poll_interval: Duration,

    /// Evaluate and log, but never delete.
    pub debug: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("cache"),
            poll_interval: Duration::from_secs(15 * 60),
            debug: false,
        }
    }
}

impl SchedulerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Path of the persisted state file.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Path of the history log.
    #[must_use]
    pub fn history_file(&self) -> PathBuf {
        self.state_dir.join(HISTORY_FILE)
    }
}

/// Builder for `SchedulerConfig`.
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    state_dir: Option<PathBuf>,
    poll_interval: Option<Duration>,
    debug: Option<bool>,
}

impl SchedulerConfigBuilder {
    /// Sets the state directory.
    #[must_use]
    pub fn state_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.state_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets the watch-mode poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            state_dir: self.state_dir.unwrap_or(defaults.state_dir),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            debug: self.debug.unwrap_or(defaults.debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(900));
        assert!(!config.debug);
        assert_eq!(config.state_file(), PathBuf::from("cache/latest_cleanup.json"));
        assert_eq!(config.history_file(), PathBuf::from("cache/history.log"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SchedulerConfig::builder()
            .state_dir("/var/lib/tagsweep")
            .poll_interval(Duration::from_secs(60))
            .debug(true)
            .build();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/tagsweep"));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.debug);
    }
}
