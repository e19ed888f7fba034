//! Configuration loading and typed config structures for the mirror.
//!
//! The canonical configuration lives in `hexwatch-config.yaml` next to the
//! daemon binary. Every field has a default, so an empty file (or no file
//! at all) yields a working setup against a local NATS server.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `hexwatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HexwatchConfig {
    /// Where and how to reach the world source.
    #[serde(default)]
    pub source: SourceConfig,

    /// Reconnect backoff.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Observer relay listener.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HexwatchConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `SOURCE_URL` overrides `source.url`
    /// - `OBSERVER_PORT` overrides `observer.port`
    /// - `LOG_FORMAT` overrides `logging.format`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides and validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(port) = lookup("OBSERVER_PORT") {
            self.observer.port = port.parse().map_err(|e| ConfigError::Invalid {
                field: "observer.port",
                reason: format!("OBSERVER_PORT={port:?}: {e}"),
            })?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::Invalid {
                        field: "logging.format",
                        reason: format!("LOG_FORMAT={other:?} is neither json nor pretty"),
                    });
                }
            };
        }
        Ok(())
    }

    /// Reject values the mirror cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source.url",
                reason: String::from("must not be empty"),
            });
        }
        if self.source.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "source.request_timeout_ms",
                reason: String::from("must be positive"),
            });
        }
        if self.backoff.base_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "backoff.base_ms",
                reason: String::from("must be positive"),
            });
        }
        if self.backoff.max_ms < self.backoff.base_ms {
            return Err(ConfigError::Invalid {
                field: "backoff.max_ms",
                reason: format!(
                    "{} is below backoff.base_ms ({})",
                    self.backoff.max_ms, self.backoff.base_ms
                ),
            });
        }
        if !(0.0..1.0).contains(&self.backoff.jitter) {
            return Err(ConfigError::Invalid {
                field: "backoff.jitter",
                reason: format!("{} is outside [0, 1)", self.backoff.jitter),
            });
        }
        Ok(())
    }
}

/// Connection settings for the world source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Source endpoint (e.g. `nats://localhost:4222`).
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Deadline for each point request and for opening the subscription.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Subjects the source answers on.
    #[serde(default)]
    pub subjects: SubjectsConfig,
}

impl SourceConfig {
    /// The per-request deadline.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            request_timeout_ms: default_request_timeout_ms(),
            subjects: SubjectsConfig::default(),
        }
    }
}

/// Subject names of the four source operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubjectsConfig {
    /// `ListRooms` request subject.
    #[serde(default = "default_rooms_subject")]
    pub rooms: String,
    /// `GetRoomLayout` request subject.
    #[serde(default = "default_layout_subject")]
    pub layout: String,
    /// `GetRoomTerrain` request subject.
    #[serde(default = "default_terrain_subject")]
    pub terrain: String,
    /// Entity subscription subject.
    #[serde(default = "default_entities_subject")]
    pub entities: String,
}

impl Default for SubjectsConfig {
    fn default() -> Self {
        Self {
            rooms: default_rooms_subject(),
            layout: default_layout_subject(),
            terrain: default_terrain_subject(),
            entities: default_entities_subject(),
        }
    }
}

/// Reconnect backoff parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackoffConfig {
    /// Wait after the first failure.
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,

    /// Upper bound on any single wait.
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,

    /// Consecutive failures tolerated before giving up (`None` = forever).
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Fraction of each wait that may be shaved off at random.
    #[serde(default = "default_backoff_jitter")]
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            max_retries: None,
            jitter: default_backoff_jitter(),
        }
    }
}

/// Observer relay listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_source_url() -> String {
    String::from("nats://localhost:4222")
}

const fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_rooms_subject() -> String {
    String::from("world.rooms")
}

fn default_layout_subject() -> String {
    String::from("world.layout")
}

fn default_terrain_subject() -> String {
    String::from("world.terrain")
}

fn default_entities_subject() -> String {
    String::from("world.entities")
}

const fn default_backoff_base_ms() -> u64 {
    1_000
}

const fn default_backoff_max_ms() -> u64 {
    10_000
}

const fn default_backoff_jitter() -> f64 {
    0.1
}

fn default_observer_host() -> String {
    String::from("0.0.0.0")
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    String::from("info")
}
