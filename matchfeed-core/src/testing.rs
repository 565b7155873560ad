//! In-process fakes for the collaborator ports.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use matchfeed_sdk::objects::{DispatchPayload, EventType};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::events::MatchEvent;
use crate::ports::{
    ConsentDecision, ConsentGate, DeliveryGateway, DeliveryResponse, DispatchContext,
    GatewayError, MatchMeta, TabularStore, TabularStoreError,
};
use crate::processors::StatField;

pub fn event(match_id: &str, kind: EventType, minute: u32) -> MatchEvent {
    MatchEvent {
        id: Uuid::now_v7(),
        match_id: match_id.to_string(),
        kind,
        minute,
        player: None,
        secondary_player: None,
        card_type: None,
        period: None,
        starters: Vec::new(),
        idempotency_key: None,
        timestamp: OffsetDateTime::now_utc(),
    }
}

#[derive(Default)]
pub struct MemoryTabular {
    metas: HashMap<String, MatchMeta>,
    stats: Mutex<HashMap<(String, StatField), i64>>,
    fail_upserts: bool,
}

impl MemoryTabular {
    pub fn with_match(mut self, match_id: &str, is_home: bool) -> Self {
        self.metas.insert(
            match_id.to_string(),
            MatchMeta {
                is_home,
                opponent: "Rovers".to_string(),
                competition: "League".to_string(),
                venue: "Ground".to_string(),
            },
        );
        self
    }

    pub fn failing_upserts(mut self) -> Self {
        self.fail_upserts = true;
        self
    }

    pub fn stat(&self, player: &str, field: StatField) -> i64 {
        self.stats
            .lock()
            .unwrap()
            .get(&(player.to_string(), field))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for MemoryTabular {
    async fn get_match_meta(&self, match_id: &str) -> Result<Option<MatchMeta>, TabularStoreError> {
        Ok(self.metas.get(match_id).cloned())
    }

    async fn upsert_player_stat(
        &self,
        player: &str,
        field: StatField,
        delta: i64,
    ) -> Result<(), TabularStoreError> {
        if self.fail_upserts {
            return Err(TabularStoreError("sheet offline".to_string()));
        }
        *self
            .stats
            .lock()
            .unwrap()
            .entry((player.to_string(), field))
            .or_default() += delta;
        Ok(())
    }
}

pub struct SwitchableConsent {
    allowed: AtomicBool,
}

impl SwitchableConsent {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed: AtomicBool::new(allowed),
        }
    }

    pub fn set(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsentGate for SwitchableConsent {
    async fn evaluate(&self, _: &DispatchPayload, _: &DispatchContext) -> ConsentDecision {
        if self.allowed.load(Ordering::SeqCst) {
            ConsentDecision::allow()
        } else {
            ConsentDecision::deny("player opted out")
        }
    }
}

/// One scripted gateway answer. Once the script runs out every call succeeds.
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(u16),
    Transport,
    Malformed,
    Hang(Duration),
}

pub struct ScriptedGateway {
    script: Mutex<VecDeque<Scripted>>,
    delivered: Mutex<Vec<DispatchPayload>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delivered: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<DispatchPayload> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for ScriptedGateway {
    async fn deliver(
        &self,
        payload: &DispatchPayload,
        _: &str,
        _: Duration,
    ) -> Result<DeliveryResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Status(code)) => Ok(DeliveryResponse {
                success: (200..300).contains(&code),
                status_code: Some(code),
            }),
            Some(Scripted::Transport) => Err(GatewayError::Transport("connection reset".to_string())),
            Some(Scripted::Malformed) => Err(GatewayError::Malformed("bad body".to_string())),
            Some(Scripted::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(DeliveryResponse {
                    success: true,
                    status_code: Some(200),
                })
            }
            None => {
                self.delivered.lock().unwrap().push(payload.clone());
                Ok(DeliveryResponse {
                    success: true,
                    status_code: Some(200),
                })
            }
        }
    }
}
