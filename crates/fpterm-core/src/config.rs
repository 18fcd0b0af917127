//! Terminal configuration.
//!
//! Every section of the TOML file is optional; missing keys fall back to the
//! values in [`constants`](crate::constants).
//!
//! ```toml
//! [coordinator]
//! min_scan_ms = 3900
//! trigger = "always"
//!
//! [http]
//! bind = "127.0.0.1:8080"
//! ```

use crate::constants::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// When a present finger starts a match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTrigger {
    /// Only while a scan request is live.
    #[default]
    OnRequest,
    /// Whenever a finger is present.
    Always,
}

/// Timing and scoring parameters of the scan coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// A hit must score strictly above this to be accepted.
    pub score_threshold: u16,
    /// Minimum dwell of the scanning animation.
    pub min_scan_ms: u32,
    /// Hard deadline measured from finger detection.
    pub matching_timeout_ms: u32,
    /// Time a result stays on screen.
    pub result_ms: u32,
    /// Fail-safe return to idle after a result.
    pub forced_return_ms: u32,
    /// Breathing animation cadence.
    pub phase_ms: u32,
    /// Scan-bar cadence.
    pub scanbar_step_ms: u32,
    /// Scan-bar height and step in pixels.
    pub scanbar_thick: u8,
    /// What arms a match attempt.
    pub trigger: ScanTrigger,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            score_threshold: SCORE_MATCH_THRESHOLD,
            min_scan_ms: MIN_SCAN_MS,
            matching_timeout_ms: MATCHING_TIMEOUT_MS,
            result_ms: RESULT_MS,
            forced_return_ms: FORCED_RETURN_MS,
            phase_ms: PHASE_MS,
            scanbar_step_ms: SCANBAR_STEP_MS,
            scanbar_thick: SCANBAR_THICK,
            trigger: ScanTrigger::OnRequest,
        }
    }
}

impl CoordinatorConfig {
    /// Validates the timing parameters.
    pub fn validate(&self) -> Result<()> {
        if self.matching_timeout_ms == 0 {
            return Err(Error::Config("matching_timeout_ms must be > 0".into()));
        }
        if self.min_scan_ms >= self.matching_timeout_ms {
            return Err(Error::Config(format!(
                "min_scan_ms ({}) must be below matching_timeout_ms ({})",
                self.min_scan_ms, self.matching_timeout_ms
            )));
        }
        if self.phase_ms == 0 || self.scanbar_step_ms == 0 {
            return Err(Error::Config("animation cadences must be > 0".into()));
        }
        if self.scanbar_thick == 0 || self.scanbar_thick >= FP_PANE_SIZE {
            return Err(Error::Config(format!(
                "scanbar_thick must be 1-{}",
                FP_PANE_SIZE - 1
            )));
        }
        Ok(())
    }
}

/// Notification queue sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub max_payload: usize,
    pub warn_interval_ms: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: QUEUE_CAPACITY,
            max_payload: MAX_PAYLOAD_LEN,
            warn_interval_ms: RATE_LIMIT_WARN_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub keep_alive_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_HTTP_BIND.to_string(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_DB_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Lifetime of the request issued by the `s` command.
    pub scan_timeout_ms: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: DEFAULT_SCAN_REQUEST_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Period of the cooperative poll loop.
    pub tick_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub host: HostConfig,
}

impl TerminalConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::ConfigRead(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TerminalConfig =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.coordinator.validate()?;
        if self.queue.capacity == 0 {
            return Err(Error::Config("queue capacity must be > 0".into()));
        }
        if self.host.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be > 0".into()));
        }
        if self.storage.max_connections == 0 {
            return Err(Error::Config("max_connections must be > 0".into()));
        }
        if self.console.scan_timeout_ms > MAX_SCAN_REQUEST_MS {
            return Err(Error::Config(format!(
                "scan_timeout_ms must be <= {MAX_SCAN_REQUEST_MS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_valid() {
        assert!(TerminalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TerminalConfig::from_toml("").unwrap();
        assert_eq!(config, TerminalConfig::default());
        assert_eq!(config.coordinator.trigger, ScanTrigger::OnRequest);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TerminalConfig::from_toml(
            r#"
            [coordinator]
            min_scan_ms = 2000
            trigger = "always"
            "#,
        )
        .unwrap();

        assert_eq!(config.coordinator.min_scan_ms, 2000);
        assert_eq!(config.coordinator.trigger, ScanTrigger::Always);
        assert_eq!(config.coordinator.matching_timeout_ms, MATCHING_TIMEOUT_MS);
        assert_eq!(config.queue.capacity, QUEUE_CAPACITY);
    }

    #[test]
    fn test_dwell_longer_than_deadline_rejected() {
        let result = TerminalConfig::from_toml(
            r#"
            [coordinator]
            min_scan_ms = 20000
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let result = TerminalConfig::from_toml("[queue]\ncapacity = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_storage_section() {
        let config = TerminalConfig::from_toml(
            r#"
            [storage]
            database_path = "/var/lib/fpterm/names.db"
            max_connections = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.database_path, "/var/lib/fpterm/names.db");
        assert_eq!(config.storage.max_connections, 2);
        assert_eq!(config.storage.busy_timeout_ms, DEFAULT_DB_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_zero_pool_rejected() {
        let result = TerminalConfig::from_toml("[storage]\nmax_connections = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_scan_timeout_beyond_clock_range_rejected() {
        let result = TerminalConfig::from_toml("[console]\nscan_timeout_ms = 3000000000\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let config = TerminalConfig::from_toml(&format!(
            "[console]\nscan_timeout_ms = {MAX_SCAN_REQUEST_MS}\n"
        ))
        .unwrap();
        assert_eq!(config.console.scan_timeout_ms, MAX_SCAN_REQUEST_MS);
    }

    #[test]
    fn test_malformed_toml() {
        let result = TerminalConfig::from_toml("[coordinator\n");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nbind = \"127.0.0.1:9000\"").unwrap();

        let config = TerminalConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_file() {
        let result = TerminalConfig::from_file("/nonexistent/fpterm.toml");
        assert!(matches!(result, Err(Error::ConfigRead(_))));
    }
}
