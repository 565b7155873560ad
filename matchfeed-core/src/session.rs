//! Per-match sessions and the arena that owns them.
//!
//! Live sessions sit in numbered slots behind their own async mutex. A
//! `match_id -> slot` index finds them and a free list recycles slots once
//! a match reaches full time. Finished matches move into a bounded archive
//! of frozen summaries, oldest evicted first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use matchfeed_sdk::objects::{MatchPhase, MatchSnapshotResponse, PlayerMinutes};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::ports::MatchMeta;
use crate::processors::{
    CardHistory, MatchLifecycle, MatchState, MatchStatistics, PlayerMinutesLedger,
    PlayerMinutesView, StatisticsAggregator,
};

/// Mutable state of one live match.
#[derive(Debug)]
pub struct MatchSession {
    pub(crate) meta: Option<MatchMeta>,
    pub(crate) lifecycle: MatchLifecycle,
    pub(crate) ledger: PlayerMinutesLedger,
    pub(crate) stats: StatisticsAggregator,
    pub(crate) cards: CardHistory,
    last_minute: Option<u32>,
}

impl MatchSession {
    /// Orientation comes from `meta`; without it the match counts as home.
    pub fn new(match_id: &str, meta: Option<MatchMeta>) -> Self {
        let is_home = meta.as_ref().is_none_or(|m| m.is_home);
        Self {
            meta,
            lifecycle: MatchLifecycle::new(match_id, is_home),
            ledger: PlayerMinutesLedger::new(match_id),
            stats: StatisticsAggregator::new(match_id, is_home),
            cards: CardHistory::default(),
            last_minute: None,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.lifecycle.state().match_id
    }

    pub fn state(&self) -> &MatchState {
        self.lifecycle.state()
    }

    pub fn competition(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.competition.as_str())
    }

    /// Latest minute seen so far.
    pub fn current_minute(&self) -> u32 {
        self.last_minute.unwrap_or_default()
    }

    /// Record that an event at `minute` arrived. Returns the previous
    /// high-water mark when `minute` goes backwards.
    pub fn observe_minute(&mut self, minute: u32) -> Option<u32> {
        match self.last_minute {
            Some(previous) if minute < previous => Some(previous),
            _ => {
                self.last_minute = Some(minute);
                None
            }
        }
    }

    pub fn snapshot(&self, minute: Option<u32>) -> MatchSnapshot {
        let minute = minute.unwrap_or_else(|| self.current_minute());
        let state = self.lifecycle.state();
        MatchSnapshot {
            match_id: state.match_id.clone(),
            phase: state.phase,
            is_home: state.is_home,
            home_score: state.home_score,
            away_score: state.away_score,
            minute,
            archived: false,
            players: self.ledger.snapshot(minute),
        }
    }

    /// Frozen summary kept after full time.
    pub fn to_archive(&self) -> ArchivedMatch {
        let minute = self
            .lifecycle
            .state()
            .full_time_minute
            .unwrap_or_else(|| self.current_minute());
        ArchivedMatch {
            state: self.lifecycle.state().clone(),
            statistics: self.stats.statistics().clone(),
            final_minutes: self
                .ledger
                .final_totals()
                .cloned()
                .unwrap_or_else(|| self.ledger.projected_minutes(minute)),
            players: self.ledger.snapshot(minute),
            cards: self.cards.clone(),
            competition: self.competition().map(str::to_string),
        }
    }
}

/// Read-only summary of a finished match.
#[derive(Debug, Clone)]
pub struct ArchivedMatch {
    pub state: MatchState,
    pub statistics: MatchStatistics,
    pub final_minutes: BTreeMap<String, u32>,
    pub players: Vec<PlayerMinutesView>,
    pub cards: CardHistory,
    pub competition: Option<String>,
}

impl ArchivedMatch {
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.state.match_id.clone(),
            phase: self.state.phase,
            is_home: self.state.is_home,
            home_score: self.state.home_score,
            away_score: self.state.away_score,
            minute: self.state.full_time_minute.unwrap_or_default(),
            archived: true,
            players: self.players.clone(),
        }
    }
}

/// Point-in-time view of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub phase: MatchPhase,
    pub is_home: bool,
    pub home_score: u32,
    pub away_score: u32,
    pub minute: u32,
    pub archived: bool,
    pub players: Vec<PlayerMinutesView>,
}

impl From<MatchSnapshot> for MatchSnapshotResponse {
    fn from(snapshot: MatchSnapshot) -> Self {
        MatchSnapshotResponse {
            match_id: snapshot.match_id,
            phase: snapshot.phase,
            is_home: snapshot.is_home,
            home_score: snapshot.home_score,
            away_score: snapshot.away_score,
            minute: snapshot.minute,
            archived: snapshot.archived,
            players: snapshot
                .players
                .into_iter()
                .map(|p| PlayerMinutes {
                    player: p.player,
                    minutes: p.minutes,
                    on_pitch: p.on_pitch,
                })
                .collect(),
        }
    }
}

pub type SessionHandle = Arc<AsyncMutex<MatchSession>>;

/// Where a match currently lives.
#[derive(Debug, Clone)]
pub enum SessionSlot {
    Live(SessionHandle),
    Archived(Arc<ArchivedMatch>),
}

#[derive(Debug, Default)]
struct ArenaInner {
    slots: Vec<Option<SessionHandle>>,
    index: HashMap<String, usize>,
    free: Vec<usize>,
    archive: HashMap<String, Arc<ArchivedMatch>>,
    archive_order: VecDeque<String>,
}

/// Owns every live session and the archive of finished ones.
///
/// The arena lock only guards the bookkeeping and is never held across an
/// await. Callers hold a session's own mutex for the whole of an ingest.
#[derive(Debug)]
pub struct SessionArena {
    inner: Mutex<ArenaInner>,
    archive_capacity: usize,
}

impl SessionArena {
    pub fn new(archive_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ArenaInner::default()),
            archive_capacity,
        }
    }

    fn inner(&self) -> MutexGuard<'_, ArenaInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, match_id: &str) -> Option<SessionSlot> {
        let inner = self.inner();
        if let Some(handle) = inner
            .index
            .get(match_id)
            .and_then(|&slot| inner.slots.get(slot))
            .and_then(Option::as_ref)
        {
            return Some(SessionSlot::Live(handle.clone()));
        }
        inner
            .archive
            .get(match_id)
            .map(|archived| SessionSlot::Archived(archived.clone()))
    }

    /// Place `session` in a free slot. If another caller opened the same
    /// match first, that session is returned and `session` is dropped.
    pub fn insert(&self, session: MatchSession) -> SessionSlot {
        let mut inner = self.inner();
        let match_id = session.match_id().to_string();
        if let Some(handle) = inner
            .index
            .get(&match_id)
            .and_then(|&slot| inner.slots.get(slot))
            .and_then(Option::as_ref)
        {
            return SessionSlot::Live(handle.clone());
        }
        if let Some(archived) = inner.archive.get(&match_id) {
            return SessionSlot::Archived(archived.clone());
        }

        let handle = Arc::new(AsyncMutex::new(session));
        let slot = match inner.free.pop() {
            Some(slot) => {
                inner.slots[slot] = Some(handle.clone());
                slot
            }
            None => {
                inner.slots.push(Some(handle.clone()));
                inner.slots.len() - 1
            }
        };
        inner.index.insert(match_id.clone(), slot);
        debug!(match_id = %match_id, slot = slot, "Session opened");
        SessionSlot::Live(handle)
    }

    /// Free the match's slot and keep `archived` in its place.
    pub fn archive(&self, archived: ArchivedMatch) {
        let mut inner = self.inner();
        let match_id = archived.state.match_id.clone();
        if let Some(slot) = inner.index.remove(&match_id) {
            if let Some(entry) = inner.slots.get_mut(slot) {
                *entry = None;
            }
            inner.free.push(slot);
        }

        if self.archive_capacity == 0 {
            info!(match_id = %match_id, "Match finished, archive disabled");
            return;
        }
        if inner
            .archive
            .insert(match_id.clone(), Arc::new(archived))
            .is_none()
        {
            inner.archive_order.push_back(match_id.clone());
        }
        while inner.archive_order.len() > self.archive_capacity {
            if let Some(oldest) = inner.archive_order.pop_front() {
                inner.archive.remove(&oldest);
                debug!(match_id = %oldest, "Archived match evicted");
            }
        }
        info!(match_id = %match_id, "Match archived");
    }

    /// Drop a finished match from the archive.
    pub fn evict_archived(&self, match_id: &str) -> bool {
        let mut inner = self.inner();
        if inner.archive.remove(match_id).is_none() {
            return false;
        }
        inner.archive_order.retain(|id| id != match_id);
        true
    }

    pub fn live_count(&self) -> usize {
        self.inner().index.len()
    }

    pub fn archived_count(&self) -> usize {
        self.inner().archive.len()
    }
}
