//! Validated configuration as used at runtime.
//!
//! Sections that SIGHUP may replace sit behind their own lock in
//! [`SharedConfig`]. Feed and delivery settings are fixed at startup.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchfeed_core::ports::MatchMeta;
use tokio::sync::RwLock;
use url::Url;

/// Listener and inbound authentication.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    ingest_secret: Option<Box<[u8]>>,
}

impl ServerConfig {
    pub fn new(listen: SocketAddr, ingest_secret: Option<String>) -> Self {
        Self {
            listen,
            ingest_secret: ingest_secret.map(|s| s.into_bytes().into_boxed_slice()),
        }
    }

    pub fn ingest_secret(&self) -> Option<&[u8]> {
        self.ingest_secret.as_deref()
    }
}

/// Where and how deliveries are sent.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub webhook_url: Url,
    secret: Box<[u8]>,
    pub claim_lease: Duration,
    /// `None` keeps delivered records forever.
    pub retention: Option<Duration>,
}

impl DeliveryConfig {
    pub fn new(
        webhook_url: Url,
        secret: String,
        claim_lease: Duration,
        retention: Option<Duration>,
    ) -> Self {
        Self {
            webhook_url,
            secret: secret.into_bytes().into_boxed_slice(),
            claim_lease,
            retention,
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Names are stored trimmed and lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentConfig {
    withheld_players: HashSet<String>,
    blocked_competitions: HashSet<String>,
}

impl ConsentConfig {
    pub fn new(
        withheld_players: impl IntoIterator<Item = String>,
        blocked_competitions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            withheld_players: withheld_players.into_iter().map(|p| normalize(&p)).collect(),
            blocked_competitions: blocked_competitions
                .into_iter()
                .map(|c| normalize(&c))
                .collect(),
        }
    }

    pub fn is_withheld(&self, player: &str) -> bool {
        self.withheld_players.contains(&normalize(player))
    }

    pub fn is_blocked_competition(&self, competition: &str) -> bool {
        self.blocked_competitions.contains(&normalize(competition))
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Fixture metadata keyed by match id.
pub type MatchDirectory = HashMap<String, MatchMeta>;

/// Reloadable configuration sections.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub consent: Arc<RwLock<ConsentConfig>>,
    pub matches: Arc<RwLock<MatchDirectory>>,
}
