pub mod event;
pub mod payload;
pub mod responses;

pub use event::{EventType, IncomingEvent, PeriodMarker};
pub use payload::DispatchPayload;
pub use responses::{
    DispatchReceipt, DispatchResult, IngestResponse, MatchSnapshotResponse, PlayerMinutes,
};

use serde::{Deserialize, Serialize};

/// Stage of match progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Scheduled,
    FirstHalf,
    HalfTime,
    SecondHalf,
    FullTime,
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPhase::Scheduled => write!(f, "scheduled"),
            MatchPhase::FirstHalf => write!(f, "first_half"),
            MatchPhase::HalfTime => write!(f, "half_time"),
            MatchPhase::SecondHalf => write!(f, "second_half"),
            MatchPhase::FullTime => write!(f, "full_time"),
        }
    }
}

/// Which side of the fixture an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Team,
    Opposition,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Team => write!(f, "team"),
            EventCategory::Opposition => write!(f, "opposition"),
        }
    }
}
