//! Collaborator interfaces the core depends on.
//!
//! Row storage, consent policy, and the delivery transport live outside the
//! core. Each is reached through one of these traits so that the server can
//! plug in real adapters and tests can plug in fakes.

use std::time::Duration;

use async_trait::async_trait;
use matchfeed_sdk::objects::{DispatchPayload, EventCategory};
use thiserror::Error;

use crate::processors::statistics::StatField;

/// Fixture metadata kept in the tabular store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchMeta {
    pub is_home: bool,
    pub opponent: String,
    pub competition: String,
    pub venue: String,
}

#[derive(Debug, Error)]
#[error("tabular store error: {0}")]
pub struct TabularStoreError(pub String);

/// Typed access to the row store holding fixtures and player stats.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn get_match_meta(&self, match_id: &str) -> Result<Option<MatchMeta>, TabularStoreError>;

    /// Add `delta` to one player's column. Callers do not wait on the
    /// outcome beyond logging a failure.
    async fn upsert_player_stat(
        &self,
        player: &str,
        field: StatField,
        delta: i64,
    ) -> Result<(), TabularStoreError>;
}

/// Everything a consent policy may look at besides the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    pub match_id: String,
    pub idempotency_key: String,
    pub category: EventCategory,
    pub competition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ConsentDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a payload may leave the system.
#[async_trait]
pub trait ConsentGate: Send + Sync {
    async fn evaluate(&self, payload: &DispatchPayload, context: &DispatchContext) -> ConsentDecision;
}

/// What the far end answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub success: bool,
    pub status_code: Option<u16>,
}

/// Failures that happen before a response is received.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, DNS, or timeout problems. Worth retrying.
    #[error("transport error: {0}")]
    Transport(String),

    /// The payload cannot be sent as is. Not worth retrying.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// The notification channel.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn deliver(
        &self,
        payload: &DispatchPayload,
        idempotency_key: &str,
        timeout: Duration,
    ) -> Result<DeliveryResponse, GatewayError>;
}
