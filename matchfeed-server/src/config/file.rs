//! TOML file configuration structures.
//!
//! These structs directly map to the `matchfeed.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub matches: Vec<MatchConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// When set, `POST /events` bodies must carry a `Matchfeed-Signature`
    /// made with this secret.
    #[serde(default)]
    pub ingest_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            ingest_secret: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Classification and archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_opposition_keywords")]
    pub opposition_keywords: Vec<String>,
    #[serde(default = "default_true")]
    pub detect_second_yellow: bool,
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            opposition_keywords: default_opposition_keywords(),
            detect_second_yellow: true,
            archive_capacity: default_archive_capacity(),
        }
    }
}

fn default_opposition_keywords() -> Vec<String> {
    matchfeed_core::config::DEFAULT_OPPOSITION_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_archive_capacity() -> usize {
    64
}

/// Outgoing webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub webhook_url: Url,
    /// HMAC secret used for the `Matchfeed-Signature` header.
    pub secret: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// How long a Postgres claim may stay in flight before another
    /// instance can take it over.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
    /// Delivered records older than this are purged; 0 keeps them forever.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_claim_lease_secs() -> u64 {
    120
}

fn default_retention_hours() -> u64 {
    24 * 7
}

/// Players and competitions whose events must not be published.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentConfig {
    #[serde(default)]
    pub withheld_players: Vec<String>,
    #[serde(default)]
    pub blocked_competitions: Vec<String>,
}

/// Fixture metadata for one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    pub id: String,
    pub is_home: bool,
    #[serde(default)]
    pub opponent: String,
    #[serde(default)]
    pub competition: String,
    #[serde(default)]
    pub venue: String,
}
