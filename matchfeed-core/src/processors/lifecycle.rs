//! MatchLifecycle.
//!
//! Tracks the phase of one match:
//!
//! ```text
//! Scheduled -> FirstHalf -> HalfTime -> SecondHalf -> FullTime
//! ```
//!
//! Transitions are monotonic. Repeating the marker that led into the current
//! phase is a `Duplicate` for every marker, not only kickoff: the state is
//! untouched, no anomaly is raised and nothing is dispatched. Any other
//! out-of-order marker is `Rejected`, which leaves the state untouched,
//! is reported as an anomaly and is not dispatched either. Neither outcome
//! is an error.

use matchfeed_sdk::objects::{MatchPhase, PeriodMarker};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Live state of one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub match_id: String,
    pub phase: MatchPhase,
    pub home_score: u32,
    pub away_score: u32,
    pub is_home: bool,
    pub started_at: Option<OffsetDateTime>,
    pub kickoff_minute: Option<u32>,
    pub full_time_minute: Option<u32>,
}

/// What happened to a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        from: MatchPhase,
        to: MatchPhase,
    },
    Duplicate {
        phase: MatchPhase,
    },
    Rejected {
        phase: MatchPhase,
        requested: PeriodMarker,
    },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

impl std::fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionOutcome::Applied { from, to } => write!(f, "{from} -> {to}"),
            TransitionOutcome::Duplicate { phase } => write!(f, "already in {phase}"),
            TransitionOutcome::Rejected { phase, requested } => {
                write!(f, "{requested} rejected in {phase}")
            }
        }
    }
}

/// Phase a transition starts from.
fn source(marker: PeriodMarker) -> MatchPhase {
    match marker {
        PeriodMarker::Kickoff => MatchPhase::Scheduled,
        PeriodMarker::Halftime => MatchPhase::FirstHalf,
        PeriodMarker::SecondHalf => MatchPhase::HalfTime,
        PeriodMarker::Fulltime => MatchPhase::SecondHalf,
    }
}

/// Phase a transition ends in.
fn target(marker: PeriodMarker) -> MatchPhase {
    match marker {
        PeriodMarker::Kickoff => MatchPhase::FirstHalf,
        PeriodMarker::Halftime => MatchPhase::HalfTime,
        PeriodMarker::SecondHalf => MatchPhase::SecondHalf,
        PeriodMarker::Fulltime => MatchPhase::FullTime,
    }
}

/// Outcome of requesting `marker` while in `phase`, without applying it.
pub fn check_transition(phase: MatchPhase, marker: PeriodMarker) -> TransitionOutcome {
    if phase == source(marker) {
        TransitionOutcome::Applied {
            from: phase,
            to: target(marker),
        }
    } else if phase == target(marker) {
        TransitionOutcome::Duplicate { phase }
    } else {
        TransitionOutcome::Rejected {
            phase,
            requested: marker,
        }
    }
}

/// The transition that moves a match out of `phase`.
///
/// A finished match maps to `Fulltime`, which then resolves as a duplicate.
pub fn next_transition(phase: MatchPhase) -> PeriodMarker {
    match phase {
        MatchPhase::Scheduled => PeriodMarker::Kickoff,
        MatchPhase::FirstHalf => PeriodMarker::Halftime,
        MatchPhase::HalfTime => PeriodMarker::SecondHalf,
        MatchPhase::SecondHalf | MatchPhase::FullTime => PeriodMarker::Fulltime,
    }
}

/// Owns the [`MatchState`] of one match and guards its transitions.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    state: MatchState,
}

impl MatchLifecycle {
    pub fn new(match_id: impl Into<String>, is_home: bool) -> Self {
        Self {
            state: MatchState {
                match_id: match_id.into(),
                phase: MatchPhase::Scheduled,
                home_score: 0,
                away_score: 0,
                is_home,
                started_at: None,
                kickoff_minute: None,
                full_time_minute: None,
            },
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == MatchPhase::FullTime
    }

    pub fn kickoff(&mut self, minute: u32) -> TransitionOutcome {
        self.apply(PeriodMarker::Kickoff, minute)
    }

    pub fn halftime(&mut self, minute: u32) -> TransitionOutcome {
        self.apply(PeriodMarker::Halftime, minute)
    }

    pub fn second_half_kickoff(&mut self, minute: u32) -> TransitionOutcome {
        self.apply(PeriodMarker::SecondHalf, minute)
    }

    /// Ends the match. The caller finalizes the ledger when this is applied.
    pub fn fulltime(&mut self, minute: u32) -> TransitionOutcome {
        self.apply(PeriodMarker::Fulltime, minute)
    }

    /// Apply `marker` at `minute` if it is valid from the current phase.
    pub fn apply(&mut self, marker: PeriodMarker, minute: u32) -> TransitionOutcome {
        let outcome = check_transition(self.state.phase, marker);
        match outcome {
            TransitionOutcome::Applied { from, to } => {
                self.state.phase = to;
                match marker {
                    PeriodMarker::Kickoff => {
                        self.state.started_at = Some(OffsetDateTime::now_utc());
                        self.state.kickoff_minute = Some(minute);
                    }
                    PeriodMarker::Fulltime => {
                        self.state.full_time_minute = Some(minute);
                    }
                    PeriodMarker::Halftime | PeriodMarker::SecondHalf => {}
                }
                info!(
                    match_id = %self.state.match_id,
                    from = %from,
                    to = %to,
                    minute = minute,
                    "Match phase changed"
                );
            }
            TransitionOutcome::Duplicate { phase } => {
                debug!(
                    match_id = %self.state.match_id,
                    phase = %phase,
                    requested = %marker,
                    "Duplicate phase transition ignored"
                );
            }
            TransitionOutcome::Rejected { phase, requested } => {
                warn!(
                    match_id = %self.state.match_id,
                    phase = %phase,
                    requested = %requested,
                    "Invalid phase transition rejected"
                );
            }
        }
        outcome
    }

    /// Mirror the running score. Ignored once the match is finished.
    pub fn record_score(&mut self, home: u32, away: u32) -> bool {
        if self.is_finished() {
            if (home, away) != (self.state.home_score, self.state.away_score) {
                warn!(
                    match_id = %self.state.match_id,
                    home = home,
                    away = away,
                    "Score change after full time ignored"
                );
            }
            return false;
        }
        self.state.home_score = home;
        self.state.away_score = away;
        true
    }
}
