//! Engine configuration.
//!
//! # Responsibility
//! - Hold the static knobs of the ingestion engine (sources, retention cap,
//!   retry and timer settings).
//! - Load them from JSON supplied by the host application.
//!
//! # Invariants
//! - Configuration is read once at start-up and never mutated afterwards.
//! - Every field has a default, so partial JSON documents are accepted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

const DEFAULT_RETENTION_LIMIT: u32 = 50;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10 * 60;
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

const DEFAULT_SOURCES: &[(&str, &str)] = &[
    ("Genbeta", "https://www.genbeta.com/rss"),
    ("MuyComputer", "https://www.muycomputer.com/feed"),
    (
        "El Androide Libre",
        "https://elandroidelibre.elespanol.com/feed",
    ),
    ("DesdeLinux", "https://desdelinux.net/feed/"),
    ("Linux Adictos", "https://linuxadictos.com/feed/"),
    ("El Atareao", "https://elatareao.com/feed/"),
    ("MuyLinux", "https://www.muylinux.com/feed/"),
];

/// One configured `(name, endpoint)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub endpoint: String,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Static configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered source list; order is kept in logs and cycle reports.
    pub sources: Vec<SourceConfig>,
    /// Maximum number of non-favorited items kept after a cycle.
    pub retention_limit: u32,
    pub refresh_interval_secs: u64,
    /// Attempts per source and cycle, including the first one.
    pub fetch_attempts: u32,
    pub retry_delay_ms: u64,
    /// Transport timeout applied to each attempt.
    pub fetch_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    /// Trigger one cycle as soon as the engine starts.
    pub refresh_on_start: bool,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES
                .iter()
                .map(|(name, endpoint)| SourceConfig::new(*name, *endpoint))
                .collect(),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            refresh_on_start: false,
            user_agent: format!("newsfeed/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields fall back to [`EngineConfig::default`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    /// Checks numeric bounds.
    ///
    /// Source names and endpoints are validated by
    /// [`SourceRegistry`](crate::source::SourceRegistry).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read engine config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse engine config: {err}"),
            Self::Invalid(message) => write!(f, "invalid engine config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
