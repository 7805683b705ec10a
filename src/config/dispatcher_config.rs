//! Dispatcher configuration as operator-tunable TOML values
//!
//! Each section implements `Default` with the values the dispatcher ran with
//! before a config file existed, so an absent or empty file changes nothing.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::defaults;

/// Environment variable naming the config file. Read by the CLI as the
/// default for `--config`.
pub const CONFIG_ENV_VAR: &str = "VLA_DISPATCHER_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "dispatcher.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a dispatcher deployment.
///
/// The file is located with [`DispatcherConfig::resolve()`]:
/// 1. `--config` or the `$VLA_DISPATCHER_CONFIG` env var (must exist)
/// 2. `./dispatcher.toml`
/// 3. Built-in defaults when neither is present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Which projects and intents trigger
    #[serde(default)]
    pub filters: FilterConfig,

    /// Command queue handoff
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Observation document multicast listener
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Project and intent substring filters. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Trigger only on projects whose id contains this substring
    pub project: String,
    /// Trigger SESSION only when the open session's intent contains this substring
    pub intent: String,
}

/// On-disk layout of a dispatched command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueueFormat {
    /// One JSON object with the full event
    #[default]
    Json,
    /// Single line `ELWA_TYPE id t ra dec duration`
    Legacy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Write commands to the queue file (otherwise listen and log only)
    pub enabled: bool,
    /// Path of the single-slot queue file
    pub queue_path: PathBuf,
    /// Interval between checks for the slot to clear (ms)
    pub poll_interval_ms: u64,
    /// Give up on an event after waiting this long for the slot (s, 0 = forever)
    pub wait_timeout_secs: u64,
    /// Command file layout
    pub format: QueueFormat,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_path: PathBuf::from(defaults::DEFAULT_QUEUE_PATH),
            poll_interval_ms: defaults::QUEUE_POLL_INTERVAL_MS,
            wait_timeout_secs: defaults::QUEUE_WAIT_TIMEOUT_SECS,
            format: QueueFormat::Json,
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` means wait for the slot indefinitely.
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_secs > 0).then(|| Duration::from_secs(self.wait_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Multicast group address
    pub group: String,
    /// UDP port
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            group: defaults::OBSDOC_MULTICAST_GROUP.to_string(),
            port: defaults::OBSDOC_MULTICAST_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Debug-level output
    pub verbose: bool,
    /// JSON log lines instead of human-readable text
    pub json: bool,
}

impl DispatcherConfig {
    /// Resolve the configuration for this run.
    ///
    /// `explicit` is the path given by `--config` or `$VLA_DISPATCHER_CONFIG`;
    /// it must exist. Without one, `./dispatcher.toml` is used when present,
    /// otherwise the built-in defaults. A file that is found but cannot be
    /// read, parsed or validated is an error in both cases.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, ConfigOrigin), ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::search_path() {
                Some(local) => local,
                None => return Ok((Self::default(), ConfigOrigin::Defaults)),
            },
        };
        let config = Self::load_from_file(&path)?;
        Ok((config, ConfigOrigin::File(path)))
    }

    /// `./dispatcher.toml` if it exists.
    pub fn search_path() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check the configuration for values the dispatcher cannot run with.
    ///
    /// All problems are collected before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.dispatch.queue_path.as_os_str().is_empty() {
            errors.push("dispatch.queue_path must not be empty".to_string());
        }
        if self.dispatch.poll_interval_ms == 0 {
            errors.push("dispatch.poll_interval_ms must be > 0".to_string());
        }
        if self.dispatch.wait_timeout_secs > 0
            && Duration::from_secs(self.dispatch.wait_timeout_secs) < self.dispatch.poll_interval()
        {
            errors.push(format!(
                "dispatch.wait_timeout_secs ({}) is shorter than one poll interval ({} ms)",
                self.dispatch.wait_timeout_secs, self.dispatch.poll_interval_ms
            ));
        }

        match self.listener.group.parse::<Ipv4Addr>() {
            Ok(addr) if !addr.is_multicast() => {
                errors.push(format!("listener.group {} is not a multicast address", addr));
            }
            Ok(_) => {}
            Err(_) => {
                errors.push(format!(
                    "listener.group '{}' is not an IPv4 address",
                    self.listener.group
                ));
            }
        }
        if self.listener.port == 0 {
            errors.push("listener.port must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Where [`DispatcherConfig::resolve()`] took the configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: DispatcherConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.filters, FilterConfig::default());
        assert!(!config.dispatch.enabled);
        assert_eq!(config.dispatch.queue_path, PathBuf::from("incoming.cmd"));
        assert_eq!(config.dispatch.poll_interval_ms, 1_000);
        assert_eq!(config.dispatch.format, QueueFormat::Json);
        assert_eq!(config.listener.group, "239.192.3.2");
        assert_eq!(config.listener.port, 53_001);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[filters]
intent = "OBSERVE_TARGET"

[dispatch]
enabled = true
format = "legacy"
"#;
        let config: DispatcherConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.filters.intent, "OBSERVE_TARGET");
        assert_eq!(config.filters.project, "");
        assert!(config.dispatch.enabled);
        assert_eq!(config.dispatch.format, QueueFormat::Legacy);
        assert_eq!(config.dispatch.wait_timeout_secs, 300);
    }

    #[test]
    fn test_zero_timeout_waits_forever() {
        let mut config = DispatcherConfig::default();
        config.dispatch.wait_timeout_secs = 0;
        assert!(config.dispatch.wait_timeout().is_none());
        config.dispatch.wait_timeout_secs = 5;
        assert_eq!(config.dispatch.wait_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = DispatcherConfig::default();
        config.dispatch.poll_interval_ms = 0;
        config.listener.group = "10.0.0.1".to_string();
        config.listener.port = 0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3, "{:?}", errors),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_timeout_validates() {
        let mut config = DispatcherConfig::default();
        config.dispatch.wait_timeout_secs = u64::MAX / 10;
        assert!(config.validate().is_ok());
        config.dispatch.wait_timeout_secs = u64::MAX;
        config.dispatch.poll_interval_ms = u64::MAX;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip_keeps_filters() {
        let mut config = DispatcherConfig::default();
        config.filters.project = "19A-".to_string();
        let text = config.to_toml().unwrap();
        let back: DispatcherConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.filters.project, "19A-");
    }
}
