//! PlayerMinutesLedger.
//!
//! Records, per match, the intervals each player spent on the pitch. A
//! player has at most one open segment at any time. Inconsistent input
//! (a substitution for a player who is not on, a duplicate substitution)
//! never fails: the ledger repairs itself and reports a [`LedgerAnomaly`].

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

/// A contiguous interval on the pitch. `off_minute` is `None` while open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSegment {
    pub on_minute: u32,
    pub off_minute: Option<u32>,
}

impl PlayerSegment {
    pub fn is_open(&self) -> bool {
        self.off_minute.is_none()
    }

    /// Length of the segment, measured up to `until` while it is open.
    pub fn duration(&self, until: u32) -> u32 {
        self.off_minute
            .unwrap_or(until)
            .saturating_sub(self.on_minute)
    }
}

/// All segments of one player plus the minutes already banked from closed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRecord {
    segments: Vec<PlayerSegment>,
    closed_minutes: u32,
}

impl PlayerRecord {
    pub fn segments(&self) -> &[PlayerSegment] {
        &self.segments
    }

    pub fn is_on_pitch(&self) -> bool {
        self.open_segment().is_some()
    }

    /// Minutes from closed segments only.
    pub fn closed_minutes(&self) -> u32 {
        self.closed_minutes
    }

    /// Minutes played if the open segment (if any) ended at `current_minute`.
    pub fn minutes_until(&self, current_minute: u32) -> u32 {
        let open = self
            .open_segment()
            .map_or(0, |s| s.duration(current_minute));
        self.closed_minutes.saturating_add(open)
    }

    fn open_segment(&self) -> Option<&PlayerSegment> {
        self.segments.last().filter(|s| s.is_open())
    }

    fn open(&mut self, minute: u32) {
        self.segments.push(PlayerSegment {
            on_minute: minute,
            off_minute: None,
        });
    }

    /// Close the open segment at `minute`. Returns the closed duration, or
    /// `None` if there was no open segment. Closing before the segment
    /// started is clamped to zero length.
    fn close(&mut self, minute: u32) -> Option<u32> {
        let segment = self.segments.last_mut().filter(|s| s.is_open())?;
        let off = minute.max(segment.on_minute);
        segment.off_minute = Some(off);
        let duration = segment.duration(off);
        self.closed_minutes = self.closed_minutes.saturating_add(duration);
        Some(duration)
    }
}

/// Inconsistencies the ledger repaired on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerAnomaly {
    #[error("{player} is already on the pitch at minute {minute}")]
    AlreadyOnPitch { player: String, minute: u32 },

    #[error("{player} has no open segment to close at minute {minute}")]
    MissingOpenSegment { player: String, minute: u32 },

    #[error("{player} went off at minute {minute}, before coming on at {on_minute}")]
    NegativeSegment {
        player: String,
        on_minute: u32,
        minute: u32,
    },

    #[error("substitution at minute {minute} names no player {side}")]
    MissingPlayer { side: &'static str, minute: u32 },

    #[error("ledger was already finalized at minute {finalized_at}")]
    AlreadyFinalized { finalized_at: u32 },
}

/// Result of one substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    /// Minutes banked for the player going off.
    pub closed_minutes: Option<u32>,
    pub anomalies: Vec<LedgerAnomaly>,
}

/// Result of a finalize call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// `false` when the ledger had already been finalized.
    pub newly_finalized: bool,
    pub anomalies: Vec<LedgerAnomaly>,
}

/// Read-only view of one player's minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMinutesView {
    pub player: String,
    pub minutes: u32,
    pub on_pitch: bool,
}

/// On-pitch time ledger for one match.
#[derive(Debug, Clone)]
pub struct PlayerMinutesLedger {
    match_id: String,
    players: BTreeMap<String, PlayerRecord>,
    finalized_at: Option<u32>,
    totals: BTreeMap<String, u32>,
}

impl PlayerMinutesLedger {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            players: BTreeMap::new(),
            finalized_at: None,
            totals: BTreeMap::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn player(&self, name: &str) -> Option<&PlayerRecord> {
        self.players.get(name)
    }

    /// Players currently on the pitch, in name order.
    pub fn on_pitch(&self) -> impl Iterator<Item = &str> {
        self.players
            .iter()
            .filter(|(_, r)| r.is_on_pitch())
            .map(|(name, _)| name.as_str())
    }

    /// Open one segment per starter at `kickoff_minute`.
    pub fn initialize(&mut self, starters: &[String], kickoff_minute: u32) -> Vec<LedgerAnomaly> {
        let mut anomalies = Vec::new();
        if let Some(finalized_at) = self.finalized_at {
            anomalies.push(self.report(LedgerAnomaly::AlreadyFinalized { finalized_at }));
            return anomalies;
        }
        for starter in starters {
            let record = self.players.entry(starter.clone()).or_default();
            if record.is_on_pitch() {
                anomalies.push(LedgerAnomaly::AlreadyOnPitch {
                    player: starter.clone(),
                    minute: kickoff_minute,
                });
                continue;
            }
            record.open(kickoff_minute);
        }
        for anomaly in &anomalies {
            self.log(anomaly);
        }
        info!(
            match_id = %self.match_id,
            starters = starters.len(),
            minute = kickoff_minute,
            "Ledger initialized"
        );
        anomalies
    }

    /// Take `player_off` off and bring `player_on` on at `minute`.
    pub fn substitute(
        &mut self,
        player_off: Option<&str>,
        player_on: Option<&str>,
        minute: u32,
    ) -> SubstitutionReport {
        let mut report = SubstitutionReport::default();
        if let Some(finalized_at) = self.finalized_at {
            report
                .anomalies
                .push(self.report(LedgerAnomaly::AlreadyFinalized { finalized_at }));
            return report;
        }

        match player_off {
            Some(off) => {
                let record = self.players.entry(off.to_string()).or_default();
                let on_minute = record.segments().last().map(|s| s.on_minute);
                match record.close(minute) {
                    Some(duration) => {
                        report.closed_minutes = Some(duration);
                        if let Some(on_minute) = on_minute.filter(|&on| minute < on) {
                            report.anomalies.push(LedgerAnomaly::NegativeSegment {
                                player: off.to_string(),
                                on_minute,
                                minute,
                            });
                        }
                    }
                    None => {
                        record.segments.push(PlayerSegment {
                            on_minute: minute,
                            off_minute: Some(minute),
                        });
                        report.closed_minutes = Some(0);
                        report.anomalies.push(LedgerAnomaly::MissingOpenSegment {
                            player: off.to_string(),
                            minute,
                        });
                    }
                }
            }
            None => report.anomalies.push(LedgerAnomaly::MissingPlayer {
                side: "off",
                minute,
            }),
        }

        match player_on {
            Some(on) => {
                let record = self.players.entry(on.to_string()).or_default();
                if record.is_on_pitch() {
                    report.anomalies.push(LedgerAnomaly::AlreadyOnPitch {
                        player: on.to_string(),
                        minute,
                    });
                } else {
                    record.open(minute);
                }
            }
            None => report.anomalies.push(LedgerAnomaly::MissingPlayer {
                side: "on",
                minute,
            }),
        }

        for anomaly in &report.anomalies {
            self.log(anomaly);
        }
        report
    }

    /// Minutes per player as if every open segment ended at `current_minute`.
    ///
    /// Does not touch any segment. After finalization the committed totals
    /// are returned instead.
    pub fn projected_minutes(&self, current_minute: u32) -> BTreeMap<String, u32> {
        if self.is_finalized() {
            return self.totals.clone();
        }
        self.players
            .iter()
            .map(|(name, record)| (name.clone(), record.minutes_until(current_minute)))
            .collect()
    }

    /// Per-player view for display at `current_minute`.
    pub fn snapshot(&self, current_minute: u32) -> Vec<PlayerMinutesView> {
        self.players
            .iter()
            .map(|(name, record)| PlayerMinutesView {
                player: name.clone(),
                minutes: match self.finalized_at {
                    Some(_) => self.totals.get(name).copied().unwrap_or_default(),
                    None => record.minutes_until(current_minute),
                },
                on_pitch: record.is_on_pitch(),
            })
            .collect()
    }

    /// Close every open segment at `full_time_minute` and commit totals.
    ///
    /// Only the first call has any effect.
    pub fn finalize(&mut self, full_time_minute: u32) -> FinalizeReport {
        if let Some(finalized_at) = self.finalized_at {
            info!(
                match_id = %self.match_id,
                finalized_at = finalized_at,
                "Ledger already finalized"
            );
            return FinalizeReport::default();
        }

        let mut anomalies = Vec::new();
        for (name, record) in self.players.iter_mut() {
            let on_minute = record.segments().last().map(|s| s.on_minute);
            if record.close(full_time_minute).is_some() {
                if let Some(on_minute) = on_minute.filter(|&on| full_time_minute < on) {
                    anomalies.push(LedgerAnomaly::NegativeSegment {
                        player: name.clone(),
                        on_minute,
                        minute: full_time_minute,
                    });
                }
            }
        }
        self.totals = self
            .players
            .iter()
            .map(|(name, record)| (name.clone(), record.closed_minutes()))
            .collect();
        self.finalized_at = Some(full_time_minute);

        for anomaly in &anomalies {
            self.log(anomaly);
        }
        info!(
            match_id = %self.match_id,
            minute = full_time_minute,
            players = self.totals.len(),
            "Ledger finalized"
        );
        FinalizeReport {
            newly_finalized: true,
            anomalies,
        }
    }

    /// Committed totals, available once finalized.
    pub fn final_totals(&self) -> Option<&BTreeMap<String, u32>> {
        self.finalized_at.map(|_| &self.totals)
    }

    fn report(&self, anomaly: LedgerAnomaly) -> LedgerAnomaly {
        self.log(&anomaly);
        anomaly
    }

    fn log(&self, anomaly: &LedgerAnomaly) {
        warn!(match_id = %self.match_id, anomaly = %anomaly, "Ledger anomaly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substitution_scenario() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        assert!(ledger.initialize(&names(&["A", "B", "C"]), 0).is_empty());

        let report = ledger.substitute(Some("B"), Some("D"), 60);
        assert_eq!(report.closed_minutes, Some(60));
        assert!(report.anomalies.is_empty());

        let finalize = ledger.finalize(90);
        assert!(finalize.newly_finalized);

        let totals = ledger.final_totals().unwrap();
        let expected: BTreeMap<String, u32> = [("A", 90), ("B", 60), ("C", 90), ("D", 30)]
            .into_iter()
            .map(|(p, m)| (p.to_string(), m))
            .collect();
        assert_eq!(totals, &expected);
        assert_eq!(ledger.on_pitch().count(), 0);
    }

    #[test]
    fn test_projection_does_not_mutate() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A", "B"]), 0);
        ledger.substitute(Some("B"), Some("C"), 30);

        let projected = ledger.projected_minutes(50);
        assert_eq!(projected.get("A"), Some(&50));
        assert_eq!(projected.get("B"), Some(&30));
        assert_eq!(projected.get("C"), Some(&20));

        assert!(ledger.player("A").unwrap().is_on_pitch());
        assert_eq!(ledger.player("A").unwrap().segments().len(), 1);
        assert!(ledger.player("A").unwrap().segments()[0].is_open());
    }

    #[test]
    fn test_duplicate_substitution_self_heals() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A", "B"]), 0);
        ledger.substitute(Some("B"), Some("D"), 60);

        let duplicate = ledger.substitute(Some("B"), Some("D"), 60);
        assert_eq!(duplicate.closed_minutes, Some(0));
        assert_eq!(
            duplicate.anomalies,
            vec![
                LedgerAnomaly::MissingOpenSegment {
                    player: "B".to_string(),
                    minute: 60
                },
                LedgerAnomaly::AlreadyOnPitch {
                    player: "D".to_string(),
                    minute: 60
                },
            ]
        );

        let b = ledger.player("B").unwrap();
        assert_eq!(b.segments().len(), 2);
        assert_eq!(b.segments()[1].duration(90), 0);
        assert_eq!(ledger.player("D").unwrap().segments().len(), 1);

        ledger.finalize(90);
        let totals = ledger.final_totals().unwrap();
        assert_eq!(totals.get("B"), Some(&60));
        assert_eq!(totals.get("D"), Some(&30));
    }

    #[test]
    fn test_unknown_player_off_gets_zero_length_segment() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A"]), 0);
        let report = ledger.substitute(Some("Z"), Some("E"), 20);
        assert_eq!(report.anomalies.len(), 1);
        assert!(!ledger.player("Z").unwrap().is_on_pitch());
        assert!(ledger.player("E").unwrap().is_on_pitch());
    }

    #[test]
    fn test_backwards_substitution_is_clamped() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A"]), 0);
        ledger.substitute(Some("A"), Some("B"), 50);
        let report = ledger.substitute(Some("B"), Some("C"), 40);
        assert_eq!(report.closed_minutes, Some(0));
        assert!(matches!(
            report.anomalies[0],
            LedgerAnomaly::NegativeSegment { .. }
        ));
        ledger.finalize(90);
        assert_eq!(ledger.final_totals().unwrap().get("B"), Some(&0));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A"]), 0);
        assert!(ledger.finalize(90).newly_finalized);
        assert!(!ledger.finalize(95).newly_finalized);
        assert_eq!(ledger.final_totals().unwrap().get("A"), Some(&90));
        assert_eq!(ledger.projected_minutes(120).get("A"), Some(&90));
    }

    #[test]
    fn test_substitution_after_finalize_is_ignored() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A"]), 0);
        ledger.finalize(90);
        let report = ledger.substitute(Some("A"), Some("B"), 91);
        assert_eq!(
            report.anomalies,
            vec![LedgerAnomaly::AlreadyFinalized { finalized_at: 90 }]
        );
        assert!(ledger.player("B").is_none());
    }

    #[test]
    fn test_re_entry_opens_second_segment() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A"]), 0);
        ledger.substitute(Some("A"), Some("B"), 20);
        ledger.substitute(Some("B"), Some("A"), 50);
        ledger.finalize(90);
        let totals = ledger.final_totals().unwrap();
        assert_eq!(totals.get("A"), Some(&60));
        assert_eq!(totals.get("B"), Some(&30));
        assert_eq!(ledger.player("A").unwrap().segments().len(), 2);
    }

    #[test]
    fn test_extreme_minutes_saturate() {
        let mut ledger = PlayerMinutesLedger::new("m-1");
        ledger.initialize(&names(&["A", "B"]), 0);
        ledger.substitute(Some("A"), Some("C"), 4_000_000_000);
        let back = ledger.substitute(Some("C"), Some("A"), 0);
        assert_eq!(back.closed_minutes, Some(0));
        ledger.substitute(Some("A"), Some("D"), 1_000_000_000);

        assert_eq!(ledger.player("A").unwrap().closed_minutes(), u32::MAX);
        assert_eq!(ledger.projected_minutes(u32::MAX).get("A"), Some(&u32::MAX));

        ledger.finalize(90);
        let totals = ledger.final_totals().unwrap();
        assert_eq!(totals.get("A"), Some(&u32::MAX));
        assert_eq!(totals.get("B"), Some(&90));
        assert!(!ledger.player("D").unwrap().is_on_pitch());
    }

    proptest! {
        #[test]
        fn prop_minutes_reconcile_with_pitch_slots(
            subs in proptest::collection::vec((0usize..11, 0u32..=90), 0..20),
            full_time in 90u32..=100,
        ) {
            let starters: Vec<String> = (0..11).map(|i| format!("S{i}")).collect();
            let mut ledger = PlayerMinutesLedger::new("m-prop");
            ledger.initialize(&starters, 0);

            let mut minutes: Vec<u32> = subs.iter().map(|(_, m)| *m).collect();
            minutes.sort_unstable();

            let mut bench = 0;
            for ((slot, _), minute) in subs.iter().zip(minutes) {
                let on_pitch: Vec<String> = ledger.on_pitch().map(str::to_string).collect();
                let off = &on_pitch[slot % on_pitch.len()];
                let on = format!("B{bench}");
                bench += 1;
                let report = ledger.substitute(Some(off.as_str()), Some(on.as_str()), minute);
                prop_assert!(report.anomalies.is_empty());
            }

            ledger.finalize(full_time);
            let total: u32 = ledger.final_totals().unwrap().values().sum();
            prop_assert_eq!(total, 11 * full_time);
        }
    }
}
