//! Outgoing notification payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::MatchPhase;
use crate::signature::Signature;

/// Canonical payload delivered for every dispatched match fact.
///
/// Field order is fixed by declaration order; optional fields that do not
/// apply to an event type are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub event_type: String,
    pub match_id: String,
    pub minute: u32,
    pub player_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assist_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_yellow_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_off: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_on: Option<String>,
    pub phase: MatchPhase,
    pub is_opposition: bool,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_played: Option<BTreeMap<String, u32>>,
    pub idempotency_key: String,
    pub timestamp: i64,
}

impl Signature for DispatchPayload {}

impl DispatchPayload {
    /// SHA-256 of the canonical JSON with the timestamp zeroed, base64 encoded.
    ///
    /// Two payloads describing the same fact share a fingerprint even when
    /// they were built at different times.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let canonical = Self {
            timestamp: 0,
            ..self.clone()
        };
        let bytes = serde_json::to_vec(&canonical)?;
        let digest = ring::digest::digest(&ring::digest::SHA256, &bytes);
        Ok(fast32::base64::RFC4648_NOPAD.encode(digest.as_ref()))
    }
}
