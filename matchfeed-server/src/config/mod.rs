//! Configuration module for matchfeed-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, MatchConfig};
use crate::config::runtime::{
    ConsentConfig, DeliveryConfig, MatchDirectory, ServerConfig, SharedConfig,
};
use matchfeed_core::config::{ClassifierConfig, FeedConfig, RetryPolicy};
use matchfeed_core::ports::MatchMeta;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub delivery: DeliveryConfig,
    pub consent: ConsentConfig,
    pub matches: MatchDirectory,
}

impl LoadedConfig {
    /// Wrap the reloadable sections in `Arc<RwLock<T>>`.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            consent: Arc::new(RwLock::new(self.consent)),
            matches: Arc::new(RwLock::new(self.matches)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate, and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let delivery = &config.delivery;
    if !matches!(delivery.webhook_url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "webhook_url must be http or https, got {}",
            delivery.webhook_url.scheme()
        )));
    }
    if delivery.secret.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "delivery secret must not be empty".to_string(),
        ));
    }
    if delivery.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "max_attempts must be at least 1".to_string(),
        ));
    }
    if delivery.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "timeout_ms must be positive".to_string(),
        ));
    }
    if config
        .feed
        .opposition_keywords
        .iter()
        .all(|k| k.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "at least one opposition keyword is required".to_string(),
        ));
    }

    let budget = retry_policy(delivery).worst_case();
    if Duration::from_secs(delivery.claim_lease_secs) <= budget {
        return Err(ConfigError::ValidationError(format!(
            "claim_lease_secs ({}s) must exceed the worst-case delivery time of {}ms",
            delivery.claim_lease_secs,
            budget.as_millis()
        )));
    }

    let mut seen = HashSet::new();
    for m in &config.matches {
        if m.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "match id must not be empty".to_string(),
            ));
        }
        if !seen.insert(m.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "match {} is listed twice",
                m.id
            )));
        }
    }
    Ok(())
}

fn retry_policy(delivery: &file::DeliveryConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: delivery.max_attempts,
        attempt_timeout: Duration::from_millis(delivery.timeout_ms),
        base_backoff: Duration::from_millis(delivery.backoff_ms),
        max_backoff: Duration::from_millis(delivery.max_backoff_ms),
    }
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let delivery = file_config.delivery;
    LoadedConfig {
        server: ServerConfig::new(file_config.server.listen, file_config.server.ingest_secret),
        feed: FeedConfig {
            classifier: ClassifierConfig {
                opposition_keywords: file_config.feed.opposition_keywords,
                detect_second_yellow: file_config.feed.detect_second_yellow,
            },
            retry: retry_policy(&delivery),
            archive_capacity: file_config.feed.archive_capacity,
        },
        delivery: DeliveryConfig::new(
            delivery.webhook_url,
            delivery.secret,
            Duration::from_secs(delivery.claim_lease_secs),
            (delivery.retention_hours > 0)
                .then(|| Duration::from_secs(delivery.retention_hours.saturating_mul(3600))),
        ),
        consent: ConsentConfig::new(
            file_config.consent.withheld_players,
            file_config.consent.blocked_competitions,
        ),
        matches: file_config.matches.into_iter().map(convert_match).collect(),
    }
}

fn convert_match(m: MatchConfig) -> (String, MatchMeta) {
    (
        m.id,
        MatchMeta {
            is_home: m.is_home,
            opponent: m.opponent,
            competition: m.competition,
            venue: m.venue,
        },
    )
}

/// The Postgres URL, if the dispatch store should be persistent.
pub fn get_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}
