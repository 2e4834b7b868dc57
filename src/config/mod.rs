//! Configuration management for slotbook
//!
//! Settings come from a TOML file or from `SLOTBOOK_*` environment
//! variables. Missing sections fall back to [`Config::default`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::health::HealthConfig;
use crate::storage::StaticPackageCatalog;

/// Largest slot count a package tier may ask for
pub const MAX_PACKAGE_SLOTS: u32 = 100;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Health monitor configuration
    pub health: HealthSettings,

    /// External prober configuration
    pub prober: ProberConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Package tier name to number of slots
    pub packages: BTreeMap<String, u32>,
}

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Probe results older than this are refreshed
    pub max_age_secs: u64,

    /// Maximum probes per refresh
    pub batch_size: usize,

    /// Spacing between probe starts in milliseconds
    pub probe_delay_ms: u64,

    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Maximum probes in flight
    pub concurrency: usize,

    /// Run refreshes on a background interval instead of before each allocation
    pub background_interval_secs: Option<u64>,
}

/// External prober configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Playlist lookup API base URL
    pub base_url: String,

    /// Bearer token (optional)
    pub token: Option<String>,

    /// Retries for throttled or failing upstream responses
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let health = HealthSettings {
            max_age_secs: env_parse("SLOTBOOK_HEALTH_MAX_AGE")
                .unwrap_or(defaults.health.max_age_secs),
            batch_size: env_parse("SLOTBOOK_HEALTH_BATCH_SIZE")
                .unwrap_or(defaults.health.batch_size),
            probe_delay_ms: env_parse("SLOTBOOK_PROBE_DELAY_MS")
                .unwrap_or(defaults.health.probe_delay_ms),
            probe_timeout_secs: env_parse("SLOTBOOK_PROBE_TIMEOUT")
                .unwrap_or(defaults.health.probe_timeout_secs),
            concurrency: env_parse("SLOTBOOK_PROBE_CONCURRENCY")
                .unwrap_or(defaults.health.concurrency),
            background_interval_secs: env_parse("SLOTBOOK_HEALTH_INTERVAL"),
        };

        let prober = ProberConfig {
            base_url: std::env::var("SLOTBOOK_PROBER_URL")
                .unwrap_or(defaults.prober.base_url),
            token: std::env::var("SLOTBOOK_PROBER_TOKEN").ok(),
            max_retries: env_parse("SLOTBOOK_PROBER_RETRIES")
                .unwrap_or(defaults.prober.max_retries),
            user_agent: std::env::var("SLOTBOOK_USER_AGENT")
                .unwrap_or(defaults.prober.user_agent),
        };

        let sqlite_path = std::env::var("SLOTBOOK_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        // Comma separated tier=slots pairs, e.g. "starter=2,pro=6"
        let packages = match std::env::var("SLOTBOOK_PACKAGES") {
            Ok(raw) => parse_packages(&raw)?,
            Err(_) => defaults.packages,
        };

        let log_level =
            std::env::var("SLOTBOOK_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("SLOTBOOK_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            health,
            prober,
            database: DatabaseConfig { sqlite_path },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
            packages,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.health.batch_size == 0 {
            return Err(Error::config("health.batch_size must be greater than 0"));
        }

        if self.health.concurrency == 0 {
            return Err(Error::config("health.concurrency must be greater than 0"));
        }

        if self.health.probe_timeout_secs == 0 {
            return Err(Error::config(
                "health.probe_timeout_secs must be greater than 0",
            ));
        }

        if self.health.background_interval_secs == Some(0) {
            return Err(Error::config(
                "health.background_interval_secs must be greater than 0",
            ));
        }

        if url::Url::parse(&self.prober.base_url).is_err() {
            return Err(Error::config(format!(
                "prober.base_url is not a valid URL: {}",
                self.prober.base_url
            )));
        }

        if self.packages.is_empty() {
            return Err(Error::config("at least one package tier must be configured"));
        }

        if let Some((tier, slots)) = self
            .packages
            .iter()
            .find(|(_, slots)| **slots > MAX_PACKAGE_SLOTS)
        {
            return Err(Error::config(format!(
                "package {tier} asks for {slots} slots, at most {MAX_PACKAGE_SLOTS} allowed"
            )));
        }

        Ok(())
    }

    /// Health monitor settings with durations resolved
    #[must_use]
    pub fn health_config(&self) -> HealthConfig {
        HealthConfig {
            max_age: Duration::from_secs(self.health.max_age_secs),
            batch_size: self.health.batch_size,
            probe_delay: Duration::from_millis(self.health.probe_delay_ms),
            probe_timeout: Duration::from_secs(self.health.probe_timeout_secs),
            concurrency: self.health.concurrency,
        }
    }

    /// Background refresh interval, if refreshes should not run inline
    #[must_use]
    pub fn background_interval(&self) -> Option<Duration> {
        self.health.background_interval_secs.map(Duration::from_secs)
    }

    /// Package catalog built from the configured tiers
    #[must_use]
    pub fn package_catalog(&self) -> StaticPackageCatalog {
        StaticPackageCatalog::new(self.packages.iter().map(|(k, v)| (k, *v)))
    }
}

fn parse_packages(raw: &str) -> Result<BTreeMap<String, u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (tier, slots) = pair
                .split_once('=')
                .with_context(|| format!("package entry '{pair}' is not tier=slots"))?;
            let slots = slots
                .trim()
                .parse::<u32>()
                .with_context(|| format!("package entry '{pair}' has a non-numeric slot count"))?;
            Ok((tier.trim().to_string(), slots))
        })
        .collect()
}

impl Default for HealthSettings {
    fn default() -> Self {
        let health = HealthConfig::default();
        Self {
            max_age_secs: health.max_age.as_secs(),
            batch_size: health.batch_size,
            probe_delay_ms: health.probe_delay.as_millis() as u64,
            probe_timeout_secs: health.probe_timeout.as_secs(),
            concurrency: health.concurrency,
            background_interval_secs: None,
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.spotify.com/v1"),
            token: None,
            max_retries: 3,
            user_agent: format!("slotbook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/slotbook.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            health: HealthSettings::default(),
            prober: ProberConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            packages: BTreeMap::from([
                (String::from("starter"), 2),
                (String::from("growth"), 4),
                (String::from("pro"), 6),
                (String::from("elite"), 10),
            ]),
        }
    }
}
