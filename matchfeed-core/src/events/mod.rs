//! Event types for the ingest pipeline.
//!
//! # Event Flow
//!
//! 1. `IncomingEvent` is validated into a `MatchEvent`
//! 2. `EventClassifier` labels it Team / Opposition and resolves its subtype
//! 3. `MatchLifecycle` (period events) or `PlayerMinutesLedger` (substitutions)
//!    updates the match session
//! 4. `StatisticsAggregator` folds it into score and counts
//! 5. `DispatchPipeline` delivers it at most once

pub mod types;

pub use matchfeed_sdk::objects::{EventType, IncomingEvent, PeriodMarker};
pub use types::{InvalidEventError, MAX_MINUTE, MatchEvent};
