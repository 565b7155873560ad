//! Validated match events.
//!
//! A [`MatchEvent`] is built once from an [`IncomingEvent`] and never
//! mutated afterwards; every later stage reads it by reference.

use matchfeed_sdk::objects::{EventType, IncomingEvent, PeriodMarker};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Latest minute an event may carry, extra time and stoppages included.
pub const MAX_MINUTE: u32 = 300;

/// Input that cannot be processed at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEventError {
    #[error("event has no match id")]
    MissingMatchId,

    #[error("event has no minute")]
    MissingMinute,

    #[error("minute {0} is out of range")]
    MinuteOutOfRange(i64),
}

/// A normalized live event for one fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub id: Uuid,
    pub match_id: String,
    pub kind: EventType,
    pub minute: u32,
    /// Scorer, carded player, or the player leaving on a substitution.
    pub player: Option<String>,
    /// Assisting player on a goal, or the player coming on.
    pub secondary_player: Option<String>,
    pub card_type: Option<String>,
    pub period: Option<PeriodMarker>,
    pub starters: Vec<String>,
    pub idempotency_key: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl TryFrom<IncomingEvent> for MatchEvent {
    type Error = InvalidEventError;

    fn try_from(incoming: IncomingEvent) -> Result<Self, Self::Error> {
        let match_id = non_blank(incoming.match_id).ok_or(InvalidEventError::MissingMatchId)?;
        let raw_minute = incoming.minute.ok_or(InvalidEventError::MissingMinute)?;
        let minute = u32::try_from(raw_minute)
            .ok()
            .filter(|m| *m <= MAX_MINUTE)
            .ok_or(InvalidEventError::MinuteOutOfRange(raw_minute))?;

        let (player, secondary_player) = match incoming.event_type {
            EventType::Substitution => (
                non_blank(incoming.player_off).or_else(|| non_blank(incoming.player)),
                non_blank(incoming.player_on),
            ),
            EventType::Goal => (non_blank(incoming.player), non_blank(incoming.assist)),
            EventType::Card | EventType::PeriodTransition => (non_blank(incoming.player), None),
        };

        let starters = incoming
            .starters
            .into_iter()
            .filter_map(|s| non_blank(Some(s)))
            .collect();

        Ok(Self {
            id: Uuid::now_v7(),
            match_id,
            kind: incoming.event_type,
            minute,
            player,
            secondary_player,
            card_type: non_blank(incoming.card_type),
            period: incoming.period,
            starters,
            idempotency_key: non_blank(incoming.idempotency_key),
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}

impl MatchEvent {
    /// Fill in the period of a transition that did not name one.
    pub(crate) fn with_period(self, period: PeriodMarker) -> Self {
        Self {
            period: Some(period),
            ..self
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
