//! The ingest entry point.
//!
//! [`MatchFeed`] validates an incoming event, runs it through the
//! classifier, lifecycle, ledger, and statistics stages of its match
//! session, and hands the result to the dispatch pipeline. One call runs to
//! completion under the session's lock, so events of one match are applied
//! in call order while different matches proceed independently.

use std::collections::BTreeMap;
use std::sync::Arc;

use kanau::processor::Processor;
use matchfeed_sdk::objects::{IngestResponse, MatchPhase};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::entities::DispatchStore;
use crate::events::{EventType, IncomingEvent, InvalidEventError, MatchEvent, PeriodMarker};
use crate::ports::{ConsentGate, DeliveryGateway, TabularStore};
use crate::processors::lifecycle::{check_transition, next_transition};
use crate::processors::{
    Classification, ClassificationAmbiguity, DispatchOutcome, DispatchPipeline, DispatchRequest,
    EventClassifier, EventSubtype, LedgerAnomaly, MatchState, StatDelta, TransitionOutcome,
};
use crate::session::{ArchivedMatch, MatchSession, MatchSnapshot, SessionArena, SessionHandle, SessionSlot};

/// Something odd the feed noticed and worked around.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Anomaly {
    #[error(transparent)]
    Classification(ClassificationAmbiguity),

    #[error(transparent)]
    Ledger(LedgerAnomaly),

    #[error("phase transition {0}")]
    Lifecycle(TransitionOutcome),

    #[error("minute {minute} is earlier than minute {previous} already seen")]
    OutOfOrderMinute { previous: u32, minute: u32 },

    #[error("match is already in {phase}, event applied to its final state")]
    LateEvent { phase: MatchPhase },

    #[error("{kind} at minute {minute} arrived before kickoff")]
    EventBeforeKickoff { kind: EventType, minute: u32 },
}

/// Everything that happened to one ingested event.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub event: MatchEvent,
    pub classification: Classification,
    /// Match state after the event.
    pub state: MatchState,
    pub transition: Option<TransitionOutcome>,
    pub anomalies: Vec<Anomaly>,
    pub dispatch: DispatchOutcome,
}

impl From<&IngestReport> for IngestResponse {
    fn from(report: &IngestReport) -> Self {
        IngestResponse {
            event_id: report.event.id,
            match_id: report.event.match_id.clone(),
            category: report.classification.category,
            subtype: report.classification.subtype.label().to_string(),
            phase: report.state.phase,
            home_score: report.state.home_score,
            away_score: report.state.away_score,
            anomalies: report.anomalies.iter().map(ToString::to_string).collect(),
            dispatch: (&report.dispatch).into(),
        }
    }
}

/// Ingests live events for any number of matches.
pub struct MatchFeed {
    classifier: EventClassifier,
    tabular: Arc<dyn TabularStore>,
    pipeline: DispatchPipeline,
    arena: SessionArena,
}

impl MatchFeed {
    pub fn new(
        config: FeedConfig,
        tabular: Arc<dyn TabularStore>,
        consent: Arc<dyn ConsentGate>,
        gateway: Arc<dyn DeliveryGateway>,
        records: Arc<dyn DispatchStore>,
    ) -> Self {
        Self {
            classifier: EventClassifier::new(&config.classifier),
            tabular,
            pipeline: DispatchPipeline::new(consent, gateway, records, config.retry),
            arena: SessionArena::new(config.archive_capacity),
        }
    }

    pub fn arena(&self) -> &SessionArena {
        &self.arena
    }

    /// Process one raw event. Only input that cannot be validated is an error.
    pub async fn ingest(&self, incoming: IncomingEvent) -> Result<IngestReport, InvalidEventError> {
        let event = MatchEvent::try_from(incoming).inspect_err(|e| {
            warn!(error = %e, "Invalid event rejected");
        })?;
        debug!(
            match_id = %event.match_id,
            event_id = %event.id,
            kind = %event.kind,
            minute = event.minute,
            "Event received"
        );

        let slot = match self.arena.lookup(&event.match_id) {
            Some(slot) => slot,
            None => self.open_session(&event.match_id).await,
        };
        Ok(match slot {
            SessionSlot::Live(handle) => self.ingest_live(event, handle).await,
            SessionSlot::Archived(archived) => self.ingest_late(event, &archived).await,
        })
    }

    /// Snapshot of a live or archived match. `minute` defaults to the
    /// latest minute seen.
    pub async fn snapshot(&self, match_id: &str, minute: Option<u32>) -> Option<MatchSnapshot> {
        match self.arena.lookup(match_id)? {
            SessionSlot::Live(handle) => Some(handle.lock().await.snapshot(minute)),
            SessionSlot::Archived(archived) => Some(archived.snapshot()),
        }
    }

    /// Forget a finished match. Returns whether it was archived.
    pub fn evict_archived(&self, match_id: &str) -> bool {
        self.arena.evict_archived(match_id)
    }

    async fn open_session(&self, match_id: &str) -> SessionSlot {
        let meta = match self.tabular.get_match_meta(match_id).await {
            Ok(Some(meta)) => Some(meta),
            Ok(None) => {
                warn!(match_id = %match_id, "No match metadata, assuming home fixture");
                None
            }
            Err(e) => {
                error!(match_id = %match_id, error = %e, "Failed to load match metadata, assuming home fixture");
                None
            }
        };
        self.arena.insert(MatchSession::new(match_id, meta))
    }

    async fn ingest_live(&self, event: MatchEvent, handle: SessionHandle) -> IngestReport {
        let mut session = handle.lock().await;
        if session.lifecycle.is_finished() {
            // Finished while this call waited for the lock.
            let archived = session.to_archive();
            drop(session);
            return self.ingest_late(event, &archived).await;
        }

        let mut anomalies = Vec::new();
        if let Some(previous) = session.observe_minute(event.minute) {
            warn!(
                match_id = %event.match_id,
                event_id = %event.id,
                previous = previous,
                minute = event.minute,
                "Event minute went backwards, processing anyway"
            );
            anomalies.push(Anomaly::OutOfOrderMinute {
                previous,
                minute: event.minute,
            });
        }
        if session.lifecycle.phase() == MatchPhase::Scheduled
            && event.kind != EventType::PeriodTransition
        {
            warn!(match_id = %event.match_id, kind = %event.kind, "Event before kickoff");
            anomalies.push(Anomaly::EventBeforeKickoff {
                kind: event.kind,
                minute: event.minute,
            });
        }

        let event = resolve_period(event, session.lifecycle.phase());
        let classification = self.classifier.classify(&event, &session.cards);
        if let Some(ambiguity) = &classification.ambiguity {
            anomalies.push(Anomaly::Classification(ambiguity.clone()));
        }
        if classification.subtype.is_card() {
            session
                .cards
                .record(event.player.as_deref(), classification.subtype, event.minute);
        }

        let mut deltas = session.stats.apply(&event, &classification);
        let (home, away) = session.stats.score();
        session.lifecycle.record_score(home, away);

        let mut transition = None;
        let mut minutes_played: Option<BTreeMap<String, u32>> = None;
        let mut finished = false;
        match (event.kind, classification.subtype) {
            (EventType::PeriodTransition, EventSubtype::Period(marker)) => {
                let outcome = session.lifecycle.apply(marker, event.minute);
                match outcome {
                    TransitionOutcome::Applied { .. } => match marker {
                        PeriodMarker::Kickoff => {
                            if event.starters.is_empty() {
                                debug!(match_id = %event.match_id, "Kickoff without starters");
                            }
                            let ledger = session.ledger.initialize(&event.starters, event.minute);
                            anomalies.extend(ledger.into_iter().map(Anomaly::Ledger));
                        }
                        PeriodMarker::Fulltime => {
                            let report = session.ledger.finalize(event.minute);
                            anomalies.extend(report.anomalies.into_iter().map(Anomaly::Ledger));
                            session.stats.freeze();
                            if let Some(totals) = session.ledger.final_totals() {
                                deltas.extend(session.stats.final_minutes(totals));
                                minutes_played = Some(totals.clone());
                            }
                            finished = true;
                        }
                        PeriodMarker::Halftime | PeriodMarker::SecondHalf => {}
                    },
                    TransitionOutcome::Rejected { .. } => anomalies.push(Anomaly::Lifecycle(outcome)),
                    TransitionOutcome::Duplicate { .. } => {}
                }
                transition = Some(outcome);
            }
            (EventType::Substitution, _) => {
                let report = session.ledger.substitute(
                    event.player.as_deref(),
                    event.secondary_player.as_deref(),
                    event.minute,
                );
                anomalies.extend(report.anomalies.into_iter().map(Anomaly::Ledger));
                minutes_played = Some(session.ledger.projected_minutes(event.minute));
            }
            _ => {}
        }

        self.forward_deltas(&event.match_id, &deltas).await;

        let state = session.state().clone();
        let dispatch = match skip_reason(transition.as_ref()) {
            Some(reason) => {
                debug!(match_id = %event.match_id, reason = %reason, "Dispatch skipped");
                DispatchOutcome::Skipped { reason }
            }
            None => {
                self.pipeline
                    .dispatch(DispatchRequest {
                        event: &event,
                        classification: &classification,
                        state: &state,
                        minutes_played: minutes_played.as_ref(),
                        competition: session.competition(),
                    })
                    .await
            }
        };

        if finished {
            self.arena.archive(session.to_archive());
        }
        drop(session);

        info!(
            match_id = %event.match_id,
            event_id = %event.id,
            subtype = classification.subtype.label(),
            phase = %state.phase,
            anomalies = anomalies.len(),
            delivered = dispatch.is_success(),
            "Event ingested"
        );
        IngestReport {
            event,
            classification,
            state,
            transition,
            anomalies,
            dispatch,
        }
    }

    /// Dispatch an event for a finished match against its frozen state.
    async fn ingest_late(&self, event: MatchEvent, archived: &ArchivedMatch) -> IngestReport {
        warn!(
            match_id = %event.match_id,
            event_id = %event.id,
            kind = %event.kind,
            "Event after full time, dispatching against final state"
        );
        let mut anomalies = vec![Anomaly::LateEvent {
            phase: archived.state.phase,
        }];

        let event = resolve_period(event, archived.state.phase);
        let classification = self.classifier.classify(&event, &archived.cards);
        if let Some(ambiguity) = &classification.ambiguity {
            anomalies.push(Anomaly::Classification(ambiguity.clone()));
        }

        let transition = match classification.subtype {
            EventSubtype::Period(marker) => {
                let outcome = check_transition(archived.state.phase, marker);
                if matches!(outcome, TransitionOutcome::Rejected { .. }) {
                    anomalies.push(Anomaly::Lifecycle(outcome));
                }
                Some(outcome)
            }
            _ => None,
        };
        let minutes_played = match (event.kind, event.period) {
            (EventType::Substitution, _)
            | (EventType::PeriodTransition, Some(PeriodMarker::Fulltime)) => {
                Some(&archived.final_minutes)
            }
            _ => None,
        };

        let dispatch = match skip_reason(transition.as_ref()) {
            Some(reason) => DispatchOutcome::Skipped { reason },
            None => {
                self.pipeline
                    .dispatch(DispatchRequest {
                        event: &event,
                        classification: &classification,
                        state: &archived.state,
                        minutes_played,
                        competition: archived.competition.as_deref(),
                    })
                    .await
            }
        };

        IngestReport {
            event,
            classification,
            state: archived.state.clone(),
            transition,
            anomalies,
            dispatch,
        }
    }

    async fn forward_deltas(&self, match_id: &str, deltas: &[StatDelta]) {
        for delta in deltas {
            if let Err(e) = self
                .tabular
                .upsert_player_stat(&delta.player, delta.field, delta.delta)
                .await
            {
                error!(
                    match_id = %match_id,
                    player = %delta.player,
                    field = %delta.field,
                    error = %e,
                    "Failed to update player stat"
                );
            }
        }
    }
}

/// Transitions that did not move the match publish nothing.
fn skip_reason(transition: Option<&TransitionOutcome>) -> Option<String> {
    match transition? {
        TransitionOutcome::Applied { .. } => None,
        outcome @ (TransitionOutcome::Duplicate { .. } | TransitionOutcome::Rejected { .. }) => {
            Some(format!("phase transition {outcome}"))
        }
    }
}

/// A transition that names no period advances to the next phase.
fn resolve_period(event: MatchEvent, phase: MatchPhase) -> MatchEvent {
    match (event.kind, event.period) {
        (EventType::PeriodTransition, None) => {
            let marker = next_transition(phase);
            debug!(match_id = %event.match_id, marker = %marker, "Period resolved from phase");
            event.with_period(marker)
        }
        _ => event,
    }
}

impl Processor<IncomingEvent> for MatchFeed {
    type Output = IngestReport;
    type Error = InvalidEventError;
    async fn process(&self, input: IncomingEvent) -> Result<IngestReport, InvalidEventError> {
        self.ingest(input).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use matchfeed_sdk::objects::EventCategory;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::entities::MemoryDispatchStore;
    use crate::processors::StatField;
    use crate::testing::{MemoryTabular, Scripted, ScriptedGateway, SwitchableConsent};

    struct Harness {
        feed: MatchFeed,
        tabular: Arc<MemoryTabular>,
        gateway: Arc<ScriptedGateway>,
        consent: Arc<SwitchableConsent>,
        store: Arc<MemoryDispatchStore>,
    }

    fn harness_with(tabular: MemoryTabular, script: Vec<Scripted>) -> Harness {
        let tabular = Arc::new(tabular);
        let gateway = Arc::new(ScriptedGateway::new(script));
        let consent = Arc::new(SwitchableConsent::new(true));
        let store = Arc::new(MemoryDispatchStore::new());
        let config = FeedConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                attempt_timeout: Duration::from_millis(100),
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            ..FeedConfig::default()
        };
        Harness {
            feed: MatchFeed::new(
                config,
                tabular.clone(),
                consent.clone(),
                gateway.clone(),
                store.clone(),
            ),
            tabular,
            gateway,
            consent,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryTabular::default().with_match("m-1", true), vec![])
    }

    fn period(minute: i64, marker: PeriodMarker) -> IncomingEvent {
        let mut e = IncomingEvent::new("m-1", EventType::PeriodTransition, minute);
        e.period = Some(marker);
        e
    }

    fn kickoff(starters: &[&str]) -> IncomingEvent {
        let mut e = period(0, PeriodMarker::Kickoff);
        e.starters = starters.iter().map(|s| s.to_string()).collect();
        e
    }

    fn goal(minute: i64, player: &str) -> IncomingEvent {
        let mut e = IncomingEvent::new("m-1", EventType::Goal, minute);
        e.player = Some(player.to_string());
        e
    }

    fn card(minute: i64, player: &str, card_type: &str) -> IncomingEvent {
        let mut e = IncomingEvent::new("m-1", EventType::Card, minute);
        e.player = Some(player.to_string());
        e.card_type = Some(card_type.to_string());
        e
    }

    fn sub(minute: i64, off: &str, on: &str) -> IncomingEvent {
        let mut e = IncomingEvent::new("m-1", EventType::Substitution, minute);
        e.player_off = Some(off.to_string());
        e.player_on = Some(on.to_string());
        e
    }

    async fn play_to_full_time(h: &Harness) -> IngestReport {
        h.feed.ingest(kickoff(&["A", "B", "C"])).await.unwrap();
        h.feed.ingest(period(45, PeriodMarker::Halftime)).await.unwrap();
        h.feed.ingest(period(46, PeriodMarker::SecondHalf)).await.unwrap();
        h.feed.ingest(sub(60, "B", "D")).await.unwrap();
        h.feed.ingest(period(90, PeriodMarker::Fulltime)).await.unwrap()
    }

    #[tokio::test]
    async fn test_invalid_event_is_rejected() {
        let h = harness();
        let mut e = goal(10, "Ana");
        e.minute = Some(-1);
        assert_eq!(
            h.feed.ingest(e).await.unwrap_err(),
            InvalidEventError::MinuteOutOfRange(-1)
        );

        h.feed.ingest(kickoff(&["A", "B"])).await.unwrap();
        let far = sub(4_000_000_000, "A", "C");
        assert_eq!(
            h.feed.ingest(far).await.unwrap_err(),
            InvalidEventError::MinuteOutOfRange(4_000_000_000)
        );
        assert_eq!(h.gateway.calls(), 1);
        let snapshot = h.feed.snapshot("m-1", Some(10)).await.unwrap();
        assert!(snapshot.players.iter().all(|p| p.player != "C"));
    }

    #[tokio::test]
    async fn test_full_match_reconciles_minutes() {
        let h = harness();
        let report = play_to_full_time(&h).await;

        assert_eq!(report.state.phase, MatchPhase::FullTime);
        assert!(report.dispatch.is_success());
        let minutes = h.gateway.delivered().last().unwrap().minutes_played.clone().unwrap();
        let expected: BTreeMap<String, u32> = [("A", 90), ("B", 60), ("C", 90), ("D", 30)]
            .into_iter()
            .map(|(p, m)| (p.to_string(), m))
            .collect();
        assert_eq!(minutes, expected);
        assert_eq!(h.tabular.stat("D", StatField::Minutes), 30);
        assert_eq!(h.tabular.stat("A", StatField::Appearances), 1);
        assert_eq!(h.feed.arena().live_count(), 0);
        assert_eq!(h.feed.arena().archived_count(), 1);
    }

    #[tokio::test]
    async fn test_goals_follow_orientation() {
        let h = harness_with(MemoryTabular::default().with_match("m-1", false), vec![]);
        h.feed.ingest(kickoff(&["Ana"])).await.unwrap();
        let ours = h.feed.ingest(goal(10, "Ana")).await.unwrap();
        let theirs = h.feed.ingest(goal(20, "Opposition")).await.unwrap();

        assert_eq!(ours.classification.category, EventCategory::Team);
        assert_eq!((ours.state.home_score, ours.state.away_score), (0, 1));
        assert_eq!(theirs.classification.category, EventCategory::Opposition);
        assert_eq!((theirs.state.home_score, theirs.state.away_score), (1, 1));
        assert_eq!(h.tabular.stat("Ana", StatField::Goals), 1);
    }

    #[tokio::test]
    async fn test_unknown_match_defaults_to_home() {
        let h = harness_with(MemoryTabular::default(), vec![]);
        let mut e = goal(10, "Ana");
        e.match_id = Some("m-9".to_string());
        let report = h.feed.ingest(e).await.unwrap();
        assert!(report.state.is_home);
        assert_eq!(report.state.home_score, 1);
        assert!(report
            .anomalies
            .iter()
            .any(|a| matches!(a, Anomaly::EventBeforeKickoff { .. })));
    }

    #[tokio::test]
    async fn test_second_yellow_across_events() {
        let h = harness();
        h.feed.ingest(kickoff(&["Carla"])).await.unwrap();
        h.feed.ingest(card(30, "Carla", "yellow")).await.unwrap();
        let red = h.feed.ingest(card(60, "Carla", "red")).await.unwrap();

        assert_eq!(
            red.classification.subtype,
            EventSubtype::SecondYellow {
                first_yellow_minute: Some(30)
            }
        );
        let payload = h.gateway.delivered().last().unwrap().clone();
        assert_eq!(payload.event_type, "second_yellow");
        assert_eq!(payload.first_yellow_minute, Some(30));
        assert_eq!(h.tabular.stat("Carla", StatField::YellowCards), 2);
        assert_eq!(h.tabular.stat("Carla", StatField::RedCards), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_minutes_are_processed() {
        let h = harness();
        h.feed.ingest(kickoff(&["Ana"])).await.unwrap();
        let first = h.feed.ingest(goal(50, "Ana")).await.unwrap();
        let second = h.feed.ingest(goal(40, "Ana")).await.unwrap();

        assert!(first.anomalies.is_empty());
        assert_eq!(
            second.anomalies,
            vec![Anomaly::OutOfOrderMinute {
                previous: 50,
                minute: 40
            }]
        );
        assert_eq!(second.state.home_score, 2);
        assert_eq!(h.gateway.calls(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_kickoff_and_rejected_halftime() {
        let h = harness();
        let early = h.feed.ingest(period(1, PeriodMarker::Halftime)).await.unwrap();
        assert!(matches!(
            early.transition,
            Some(TransitionOutcome::Rejected { .. })
        ));
        assert_eq!(early.state.phase, MatchPhase::Scheduled);
        assert!(matches!(early.dispatch, DispatchOutcome::Skipped { .. }));
        assert_eq!(h.gateway.calls(), 0);

        h.feed.ingest(kickoff(&["A"])).await.unwrap();
        assert_eq!(h.gateway.calls(), 1);

        let mut late_kickoff = kickoff(&["A"]);
        late_kickoff.minute = Some(2);
        let again = h.feed.ingest(late_kickoff).await.unwrap();
        assert_eq!(
            again.transition,
            Some(TransitionOutcome::Duplicate {
                phase: MatchPhase::FirstHalf
            })
        );
        assert!(matches!(again.dispatch, DispatchOutcome::Skipped { .. }));
        assert!(again.anomalies.is_empty());
        assert_eq!(h.gateway.calls(), 1);
        assert_eq!(h.store.delivered_count(), 1);

        let response = IngestResponse::from(&again);
        assert!(!response.dispatch.success);
        assert!(!response.dispatch.blocked);
        assert!(response.dispatch.reason.is_some());
    }

    #[tokio::test]
    async fn test_repeated_halftime_is_not_redelivered() {
        let h = harness();
        h.feed.ingest(kickoff(&["A"])).await.unwrap();
        h.feed.ingest(period(45, PeriodMarker::Halftime)).await.unwrap();
        let repeat = h.feed.ingest(period(47, PeriodMarker::Halftime)).await.unwrap();

        assert_eq!(
            repeat.transition,
            Some(TransitionOutcome::Duplicate {
                phase: MatchPhase::HalfTime
            })
        );
        assert!(matches!(repeat.dispatch, DispatchOutcome::Skipped { .. }));
        assert_eq!(h.gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_period_without_marker_advances_phase() {
        let h = harness();
        h.feed.ingest(kickoff(&["A"])).await.unwrap();
        let report = h
            .feed
            .ingest(IncomingEvent::new("m-1", EventType::PeriodTransition, 45))
            .await
            .unwrap();
        assert_eq!(report.state.phase, MatchPhase::HalfTime);
        assert_eq!(report.event.period, Some(PeriodMarker::Halftime));
    }

    #[tokio::test]
    async fn test_late_event_uses_frozen_state() {
        let h = harness();
        play_to_full_time(&h).await;
        let delivered_before = h.store.delivered_count();

        let late = h.feed.ingest(goal(93, "Ana")).await.unwrap();
        assert_eq!(late.anomalies[0], Anomaly::LateEvent { phase: MatchPhase::FullTime });
        assert_eq!((late.state.home_score, late.state.away_score), (0, 0));
        assert_eq!(h.tabular.stat("Ana", StatField::Goals), 0);
        assert_eq!(h.store.delivered_count(), delivered_before + 1);

        let repeat = h.feed.ingest(period(90, PeriodMarker::Fulltime)).await.unwrap();
        assert_eq!(
            repeat.transition,
            Some(TransitionOutcome::Duplicate {
                phase: MatchPhase::FullTime
            })
        );
        assert!(matches!(repeat.dispatch, DispatchOutcome::Skipped { .. }));
        assert_eq!(h.store.delivered_count(), delivered_before + 1);

        let rejected = h.feed.ingest(period(91, PeriodMarker::Halftime)).await.unwrap();
        assert!(matches!(rejected.dispatch, DispatchOutcome::Skipped { .. }));
        assert_eq!(h.store.delivered_count(), delivered_before + 1);
    }

    #[tokio::test]
    async fn test_blocked_event_is_still_applied() {
        let h = harness();
        h.feed.ingest(kickoff(&["Ana"])).await.unwrap();
        h.consent.set(false);
        let report = h.feed.ingest(goal(10, "Ana")).await.unwrap();
        assert!(matches!(report.dispatch, DispatchOutcome::Blocked { .. }));
        assert_eq!(report.state.home_score, 1);

        let response = IngestResponse::from(&report);
        assert!(response.dispatch.blocked);
        assert!(!response.dispatch.success);
    }

    #[tokio::test]
    async fn test_tabular_failures_do_not_fail_ingest() {
        let tabular = MemoryTabular::default()
            .with_match("m-1", true)
            .failing_upserts();
        let h = harness_with(tabular, vec![]);
        h.feed.ingest(kickoff(&["Ana"])).await.unwrap();
        let report = h.feed.ingest(goal(10, "Ana")).await.unwrap();
        assert!(report.dispatch.is_success());
    }

    #[tokio::test]
    async fn test_failed_delivery_reports_retryable() {
        let h = harness_with(
            MemoryTabular::default().with_match("m-1", true),
            vec![Scripted::Status(503), Scripted::Status(503)],
        );
        let report = h.feed.ingest(kickoff(&["Ana"])).await.unwrap();
        assert!(matches!(
            report.dispatch,
            DispatchOutcome::Failed { retryable: true, .. }
        ));
        assert_eq!(report.state.phase, MatchPhase::FirstHalf);
    }

    #[tokio::test]
    async fn test_snapshot_projects_minutes() {
        let h = harness();
        h.feed.ingest(kickoff(&["A", "B"])).await.unwrap();
        h.feed.ingest(sub(30, "B", "C")).await.unwrap();

        let snapshot = h.feed.snapshot("m-1", Some(40)).await.unwrap();
        assert!(!snapshot.archived);
        let minutes: Vec<(String, u32)> = snapshot
            .players
            .into_iter()
            .map(|p| (p.player, p.minutes))
            .collect();
        assert_eq!(
            minutes,
            vec![
                ("A".to_string(), 40),
                ("B".to_string(), 30),
                ("C".to_string(), 10)
            ]
        );
        assert!(h.feed.snapshot("nope", None).await.is_none());
    }

    #[tokio::test]
    async fn test_processor_delegates_to_ingest() {
        let h = harness();
        let report = h.feed.process(kickoff(&["A"])).await.unwrap();
        assert_eq!(report.state.phase, MatchPhase::FirstHalf);
    }

    #[tokio::test]
    async fn test_evicted_match_starts_fresh() {
        let h = harness();
        play_to_full_time(&h).await;
        assert!(h.feed.evict_archived("m-1"));
        let report = h.feed.ingest(goal(5, "Ana")).await.unwrap();
        assert_eq!(report.state.phase, MatchPhase::Scheduled);
    }
}
