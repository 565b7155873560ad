//! Response bodies returned by the matchfeed HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EventCategory, MatchPhase};

/// Proof of a completed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub idempotency_key: String,
    pub payload_fingerprint: String,
    pub delivered_at: i64,
    pub status_code: Option<u16>,
    pub attempts: u32,
}

/// Outcome of one dispatch attempt, in the shape callers consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DispatchReceipt>,
}

/// Response to `POST /events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub event_id: Uuid,
    pub match_id: String,
    pub category: EventCategory,
    pub subtype: String,
    pub phase: MatchPhase,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default)]
    pub anomalies: Vec<String>,
    pub dispatch: DispatchResult,
}

/// Minutes for one player in a match snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMinutes {
    pub player: String,
    pub minutes: u32,
    pub on_pitch: bool,
}

/// Response to `GET /matches/{match_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshotResponse {
    pub match_id: String,
    pub phase: MatchPhase,
    pub is_home: bool,
    pub home_score: u32,
    pub away_score: u32,
    pub minute: u32,
    pub archived: bool,
    pub players: Vec<PlayerMinutes>,
}
