//! StatisticsAggregator.
//!
//! A pure fold over classified events and ledger totals. It owns no
//! storage; the per-player deltas it returns are forwarded to the
//! `TabularStore` by the caller.

use std::collections::BTreeMap;

use matchfeed_sdk::objects::{EventCategory, EventType};
use tracing::warn;

use crate::events::MatchEvent;
use crate::processors::classifier::{Classification, EventSubtype};

/// Side of the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Home,
    Away,
}

/// Per-player column updated in the tabular store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    Goals,
    Assists,
    YellowCards,
    RedCards,
    Minutes,
    Appearances,
}

impl StatField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatField::Goals => "goals",
            StatField::Assists => "assists",
            StatField::YellowCards => "yellow_cards",
            StatField::RedCards => "red_cards",
            StatField::Minutes => "minutes",
            StatField::Appearances => "appearances",
        }
    }
}

impl std::fmt::Display for StatField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDelta {
    pub player: String,
    pub field: StatField,
    pub delta: i64,
}

impl StatDelta {
    fn new(player: &str, field: StatField, delta: i64) -> Self {
        Self {
            player: player.to_string(),
            field,
            delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalEntry {
    pub minute: u32,
    pub scorer: Option<String>,
    pub assist: Option<String>,
    pub category: EventCategory,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEntry {
    pub minute: u32,
    pub player: Option<String>,
    pub subtype: EventSubtype,
    pub category: EventCategory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardTally {
    pub yellow: u32,
    pub red: u32,
    pub second_yellow: u32,
    pub unspecified: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardCounts {
    pub team: CardTally,
    pub opposition: CardTally,
}

/// Running statistics of one match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStatistics {
    pub home_score: u32,
    pub away_score: u32,
    pub goals: Vec<GoalEntry>,
    pub cards: Vec<CardEntry>,
    pub card_counts: CardCounts,
    pub substitutions: u32,
}

#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    match_id: String,
    /// Orientation resolved once from match metadata.
    is_home: bool,
    stats: MatchStatistics,
    frozen: bool,
}

impl StatisticsAggregator {
    pub fn new(match_id: impl Into<String>, is_home: bool) -> Self {
        Self {
            match_id: match_id.into(),
            is_home,
            stats: MatchStatistics::default(),
            frozen: false,
        }
    }

    pub fn is_home(&self) -> bool {
        self.is_home
    }

    pub fn statistics(&self) -> &MatchStatistics {
        &self.stats
    }

    /// `(home, away)`.
    pub fn score(&self) -> (u32, u32) {
        (self.stats.home_score, self.stats.away_score)
    }

    /// Stop accepting events. Called at full time.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Side credited for a goal of `category`.
    pub fn side_for(&self, category: EventCategory) -> Side {
        match (category, self.is_home) {
            (EventCategory::Team, true) | (EventCategory::Opposition, false) => Side::Home,
            (EventCategory::Team, false) | (EventCategory::Opposition, true) => Side::Away,
        }
    }

    /// Fold one classified event. Returns the per-player deltas it implies.
    pub fn apply(&mut self, event: &MatchEvent, classification: &Classification) -> Vec<StatDelta> {
        if self.frozen {
            warn!(
                match_id = %self.match_id,
                event_id = %event.id,
                "Event after full time not counted"
            );
            return Vec::new();
        }

        let is_team = classification.category == EventCategory::Team;
        let mut deltas = Vec::new();

        match (event.kind, classification.subtype) {
            (EventType::Goal, _) => {
                let side = self.side_for(classification.category);
                match side {
                    Side::Home => self.stats.home_score += 1,
                    Side::Away => self.stats.away_score += 1,
                }
                self.stats.goals.push(GoalEntry {
                    minute: event.minute,
                    scorer: event.player.clone(),
                    assist: event.secondary_player.clone(),
                    category: classification.category,
                    side,
                });
                if is_team {
                    if let Some(scorer) = &event.player {
                        deltas.push(StatDelta::new(scorer, StatField::Goals, 1));
                    }
                    if let Some(assist) = &event.secondary_player {
                        deltas.push(StatDelta::new(assist, StatField::Assists, 1));
                    }
                }
            }
            (EventType::Card, subtype) => {
                let tally = if is_team {
                    &mut self.stats.card_counts.team
                } else {
                    &mut self.stats.card_counts.opposition
                };
                let fields: &[StatField] = match subtype {
                    EventSubtype::YellowCard => {
                        tally.yellow += 1;
                        &[StatField::YellowCards]
                    }
                    EventSubtype::RedCard => {
                        tally.red += 1;
                        &[StatField::RedCards]
                    }
                    EventSubtype::SecondYellow { .. } => {
                        tally.second_yellow += 1;
                        &[StatField::YellowCards, StatField::RedCards]
                    }
                    _ => {
                        tally.unspecified += 1;
                        &[]
                    }
                };
                self.stats.cards.push(CardEntry {
                    minute: event.minute,
                    player: event.player.clone(),
                    subtype,
                    category: classification.category,
                });
                if let (true, Some(player)) = (is_team, &event.player) {
                    deltas.extend(fields.iter().map(|f| StatDelta::new(player, *f, 1)));
                }
            }
            (EventType::Substitution, _) => {
                self.stats.substitutions += 1;
            }
            (EventType::PeriodTransition, _) => {}
        }

        deltas
    }

    /// Deltas for the committed minutes of every player at full time.
    pub fn final_minutes(&self, totals: &BTreeMap<String, u32>) -> Vec<StatDelta> {
        totals
            .iter()
            .flat_map(|(player, minutes)| {
                [
                    StatDelta::new(player, StatField::Minutes, i64::from(*minutes)),
                    StatDelta::new(player, StatField::Appearances, 1),
                ]
            })
            .collect()
    }
}
