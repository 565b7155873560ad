//! EventClassifier.
//!
//! Labels each event as Team or Opposition and resolves its subtype. The
//! classifier never fails: anything it cannot interpret falls back to a Team
//! event and is reported as a [`ClassificationAmbiguity`].

use std::collections::{HashMap, HashSet};

use matchfeed_sdk::objects::{EventCategory, EventType, PeriodMarker};
use thiserror::Error;
use tracing::warn;

use crate::config::ClassifierConfig;
use crate::events::MatchEvent;

/// Resolved kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSubtype {
    Goal,
    YellowCard,
    RedCard,
    SecondYellow { first_yellow_minute: Option<u32> },
    /// A card whose colour could not be read.
    UnspecifiedCard,
    Substitution,
    Period(PeriodMarker),
}

impl EventSubtype {
    /// Stable label used as the payload `event_type`.
    pub fn label(&self) -> &'static str {
        match self {
            EventSubtype::Goal => "goal",
            EventSubtype::YellowCard => "yellow_card",
            EventSubtype::RedCard => "red_card",
            EventSubtype::SecondYellow { .. } => "second_yellow",
            EventSubtype::UnspecifiedCard => "card",
            EventSubtype::Substitution => "substitution",
            EventSubtype::Period(PeriodMarker::Kickoff) => "kickoff",
            EventSubtype::Period(PeriodMarker::Halftime) => "halftime",
            EventSubtype::Period(PeriodMarker::SecondHalf) => "second_half",
            EventSubtype::Period(PeriodMarker::Fulltime) => "fulltime",
        }
    }

    pub fn is_card(&self) -> bool {
        matches!(
            self,
            EventSubtype::YellowCard
                | EventSubtype::RedCard
                | EventSubtype::SecondYellow { .. }
                | EventSubtype::UnspecifiedCard
        )
    }
}

/// Why an event was classified on a fallback path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationAmbiguity {
    #[error("{kind} event at minute {minute} names no player")]
    MissingPlayer { kind: EventType, minute: u32 },

    #[error("card at minute {minute} has unrecognised type {card_type:?}")]
    UnknownCardType {
        card_type: Option<String>,
        minute: u32,
    },

    #[error("period transition at minute {minute} names no period")]
    MissingPeriod { minute: u32 },
}

/// Result of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: EventCategory,
    pub subtype: EventSubtype,
    pub ambiguity: Option<ClassificationAmbiguity>,
}

impl Classification {
    pub fn is_opposition(&self) -> bool {
        self.category == EventCategory::Opposition
    }
}

/// Yellow cards already shown in a match, keyed by normalized player name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardHistory {
    first_yellows: HashMap<String, u32>,
}

impl CardHistory {
    /// Minute of the player's first yellow card, if any.
    pub fn first_yellow(&self, player: &str) -> Option<u32> {
        self.first_yellows.get(&normalize(player)).copied()
    }

    /// Remember a classified card. Only the first yellow per player is kept.
    pub fn record(&mut self, player: Option<&str>, subtype: EventSubtype, minute: u32) {
        let Some(player) = player else {
            return;
        };
        if subtype == EventSubtype::YellowCard {
            self.first_yellows.entry(normalize(player)).or_insert(minute);
        }
    }
}

/// Classifies events using injected keyword and toggle configuration.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    keywords: HashSet<String>,
    detect_second_yellow: bool,
}

impl EventClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            keywords: config
                .opposition_keywords
                .iter()
                .map(|k| normalize(k))
                .filter(|k| !k.is_empty())
                .collect(),
            detect_second_yellow: config.detect_second_yellow,
        }
    }

    /// Whether `name` is one of the opposition keywords.
    ///
    /// A real player whose name equals a keyword is indistinguishable from
    /// the opposition.
    pub fn is_opposition(&self, name: &str) -> bool {
        self.keywords.contains(&normalize(name))
    }

    /// Classify `event` given the cards already shown in its match.
    pub fn classify(&self, event: &MatchEvent, history: &CardHistory) -> Classification {
        let category = match event.player.as_deref() {
            Some(player) if self.is_opposition(player) => EventCategory::Opposition,
            _ => EventCategory::Team,
        };

        let mut ambiguity = None;
        let subtype = match event.kind {
            EventType::Goal => {
                if event.player.is_none() {
                    ambiguity = Some(ClassificationAmbiguity::MissingPlayer {
                        kind: event.kind,
                        minute: event.minute,
                    });
                }
                EventSubtype::Goal
            }
            EventType::Card => {
                if event.player.is_none() {
                    ambiguity = Some(ClassificationAmbiguity::MissingPlayer {
                        kind: event.kind,
                        minute: event.minute,
                    });
                }
                let subtype = self.card_subtype(event, history);
                if subtype == EventSubtype::UnspecifiedCard {
                    ambiguity = Some(ClassificationAmbiguity::UnknownCardType {
                        card_type: event.card_type.clone(),
                        minute: event.minute,
                    });
                }
                subtype
            }
            EventType::Substitution => EventSubtype::Substitution,
            EventType::PeriodTransition => match event.period {
                Some(period) => EventSubtype::Period(period),
                None => {
                    ambiguity = Some(ClassificationAmbiguity::MissingPeriod {
                        minute: event.minute,
                    });
                    EventSubtype::Period(PeriodMarker::Kickoff)
                }
            },
        };

        if let Some(reason) = &ambiguity {
            warn!(
                match_id = %event.match_id,
                event_id = %event.id,
                reason = %reason,
                "Ambiguous event classified with fallback"
            );
        }

        Classification {
            category,
            subtype,
            ambiguity,
        }
    }

    fn card_subtype(&self, event: &MatchEvent, history: &CardHistory) -> EventSubtype {
        let Some(card_type) = event.card_type.as_deref().map(normalize) else {
            return EventSubtype::UnspecifiedCard;
        };
        let mentions_red = card_type.contains("red");
        let mentions_yellow = card_type.contains("yellow");
        let first_yellow = event
            .player
            .as_deref()
            .and_then(|p| history.first_yellow(p));

        match (mentions_red, mentions_yellow) {
            (true, true) if self.detect_second_yellow => EventSubtype::SecondYellow {
                first_yellow_minute: first_yellow,
            },
            (true, true) => EventSubtype::RedCard,
            (true, false) if self.detect_second_yellow => {
                match first_yellow {
                    Some(minute) if minute <= event.minute => EventSubtype::SecondYellow {
                        first_yellow_minute: Some(minute),
                    },
                    _ => EventSubtype::RedCard,
                }
            }
            (true, false) => EventSubtype::RedCard,
            (false, true) => EventSubtype::YellowCard,
            (false, false) => EventSubtype::UnspecifiedCard,
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
