//! Incoming match event as submitted by callers.

use serde::{Deserialize, Serialize};

use crate::signature::Signature;

/// Raw event kinds accepted on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Goal,
    Card,
    Substitution,
    PeriodTransition,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Goal => write!(f, "goal"),
            EventType::Card => write!(f, "card"),
            EventType::Substitution => write!(f, "substitution"),
            EventType::PeriodTransition => write!(f, "period_transition"),
        }
    }
}

/// The phase change a `PeriodTransition` event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMarker {
    #[serde(alias = "kick_off")]
    Kickoff,
    #[serde(alias = "half_time")]
    Halftime,
    #[serde(alias = "second_half_kickoff")]
    SecondHalf,
    #[serde(alias = "full_time")]
    Fulltime,
}

impl std::fmt::Display for PeriodMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodMarker::Kickoff => write!(f, "kickoff"),
            PeriodMarker::Halftime => write!(f, "halftime"),
            PeriodMarker::SecondHalf => write!(f, "second_half"),
            PeriodMarker::Fulltime => write!(f, "fulltime"),
        }
    }
}

/// A single live event for one fixture.
///
/// Identifiers are optional on the wire so that a missing `matchId` or
/// `minute` can be reported as a validation error instead of a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    pub match_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub minute: Option<i64>,
    pub player: Option<String>,
    pub assist: Option<String>,
    pub card_type: Option<String>,
    pub player_off: Option<String>,
    pub player_on: Option<String>,
    pub period: Option<PeriodMarker>,
    /// Starting line-up, only read on kickoff.
    #[serde(default)]
    pub starters: Vec<String>,
    pub idempotency_key: Option<String>,
}

impl Signature for IncomingEvent {}

impl IncomingEvent {
    /// An event of the given type with every optional field empty.
    pub fn new(match_id: impl Into<String>, event_type: EventType, minute: i64) -> Self {
        Self {
            match_id: Some(match_id.into()),
            event_type,
            minute: Some(minute),
            player: None,
            assist: None,
            card_type: None,
            player_off: None,
            player_on: None,
            period: None,
            starters: Vec::new(),
            idempotency_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_camel_case_event() {
        let json = r#"{
            "matchId": "m-1",
            "type": "Substitution",
            "minute": 60,
            "playerOff": "Bruno",
            "playerOn": "Dani"
        }"#;
        let event: IncomingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.match_id.as_deref(), Some("m-1"));
        assert_eq!(event.event_type, EventType::Substitution);
        assert_eq!(event.minute, Some(60));
        assert_eq!(event.player_off.as_deref(), Some("Bruno"));
        assert_eq!(event.player_on.as_deref(), Some("Dani"));
        assert!(event.starters.is_empty());
    }

    #[test]
    fn test_missing_identifiers_still_decode() {
        let json = r#"{"type": "Goal", "player": "Ana"}"#;
        let event: IncomingEvent = serde_json::from_str(json).unwrap();
        assert!(event.match_id.is_none());
        assert!(event.minute.is_none());
    }

    #[test]
    fn test_period_marker_aliases() {
        let a: PeriodMarker = serde_json::from_str(r#""full_time""#).unwrap();
        let b: PeriodMarker = serde_json::from_str(r#""fulltime""#).unwrap();
        assert_eq!(a, PeriodMarker::Fulltime);
        assert_eq!(b, PeriodMarker::Fulltime);
    }
}
