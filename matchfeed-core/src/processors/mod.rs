//! Per-match processing stages.
//!
//! - `EventClassifier`: labels an event Team / Opposition and resolves its subtype
//! - `MatchLifecycle`: guards phase transitions
//! - `PlayerMinutesLedger`: on-pitch segments per player
//! - `StatisticsAggregator`: running score, cards, and per-player deltas
//! - `DispatchPipeline`: at-most-once delivery of each fact

pub mod classifier;
pub mod dispatch;
pub mod ledger;
pub mod lifecycle;
pub mod statistics;

pub use classifier::{CardHistory, Classification, ClassificationAmbiguity, EventClassifier, EventSubtype};
pub use dispatch::{DispatchOutcome, DispatchPipeline, DispatchRequest};
pub use ledger::{LedgerAnomaly, PlayerMinutesLedger, PlayerMinutesView};
pub use lifecycle::{MatchLifecycle, MatchState, TransitionOutcome};
pub use statistics::{MatchStatistics, Side, StatDelta, StatField, StatisticsAggregator};
