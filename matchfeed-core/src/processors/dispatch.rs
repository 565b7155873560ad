//! EventDispatchPipeline.
//!
//! Turns a classified event into a canonical payload and delivers it at
//! most once per idempotency key:
//!
//! 1. build the payload and resolve the key
//! 2. claim the key in the [`DispatchStore`]
//! 3. ask the [`ConsentGate`]
//! 4. deliver through the [`DeliveryGateway`] with bounded retries
//! 5. commit the record on success, release the claim otherwise

use std::collections::BTreeMap;
use std::sync::Arc;

use matchfeed_sdk::objects::{DispatchPayload, DispatchReceipt, DispatchResult, EventType};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::entities::{ClaimOutcome, DeliveryResult, DispatchRecord, DispatchStore};
use crate::events::MatchEvent;
use crate::ports::{ConsentGate, DeliveryGateway, DispatchContext, GatewayError};
use crate::processors::classifier::{Classification, EventSubtype};
use crate::processors::lifecycle::MatchState;
use crate::utils::resolve_idempotency_key;

/// What happened to one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered now, or earlier when `replayed` is set.
    Delivered {
        record: DispatchRecord,
        replayed: bool,
    },
    /// Consent denied. No record was written.
    Blocked { reason: Option<String> },
    /// Another attempt holds the key.
    InFlight,
    Failed { retryable: bool, reason: String },
    /// Nothing to publish. The gateway and the store were not touched.
    Skipped { reason: String },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

impl From<&DispatchOutcome> for DispatchResult {
    fn from(outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Delivered { record, .. } => DispatchResult {
                success: true,
                blocked: false,
                reason: None,
                result: Some(DispatchReceipt {
                    idempotency_key: record.idempotency_key.clone(),
                    payload_fingerprint: record.payload_fingerprint.clone(),
                    delivered_at: record.delivered_at.unix_timestamp(),
                    status_code: record.result.status_code,
                    attempts: record.result.attempts,
                }),
            },
            DispatchOutcome::Blocked { reason } => DispatchResult {
                success: false,
                blocked: true,
                reason: reason.clone(),
                result: None,
            },
            DispatchOutcome::InFlight => DispatchResult {
                success: false,
                blocked: false,
                reason: Some("delivery already in flight".to_string()),
                result: None,
            },
            DispatchOutcome::Failed { retryable, reason } => DispatchResult {
                success: false,
                blocked: false,
                reason: Some(if *retryable {
                    format!("{reason} (retryable)")
                } else {
                    reason.clone()
                }),
                result: None,
            },
            DispatchOutcome::Skipped { reason } => DispatchResult {
                success: false,
                blocked: false,
                reason: Some(reason.clone()),
                result: None,
            },
        }
    }
}

/// Everything one dispatch reads.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub event: &'a MatchEvent,
    pub classification: &'a Classification,
    pub state: &'a MatchState,
    /// Ledger totals, attached to substitutions and full time.
    pub minutes_played: Option<&'a BTreeMap<String, u32>>,
    pub competition: Option<&'a str>,
}

/// Canonical payload for `request` under `idempotency_key`.
pub fn build_payload(request: &DispatchRequest<'_>, idempotency_key: &str) -> DispatchPayload {
    let DispatchRequest {
        event,
        classification,
        state,
        minutes_played,
        ..
    } = *request;

    let (player_name, assist_by, player_off, player_on) = match event.kind {
        EventType::Goal => (event.player.clone(), event.secondary_player.clone(), None, None),
        EventType::Substitution => (
            event.secondary_player.clone(),
            None,
            event.player.clone(),
            event.secondary_player.clone(),
        ),
        EventType::Card | EventType::PeriodTransition => (event.player.clone(), None, None, None),
    };
    let first_yellow_minute = match classification.subtype {
        EventSubtype::SecondYellow {
            first_yellow_minute,
        } => first_yellow_minute,
        _ => None,
    };

    DispatchPayload {
        event_type: classification.subtype.label().to_string(),
        match_id: event.match_id.clone(),
        minute: event.minute,
        player_name,
        assist_by,
        card_type: event.card_type.clone().filter(|_| event.kind == EventType::Card),
        first_yellow_minute,
        player_off,
        player_on,
        phase: state.phase,
        is_opposition: classification.is_opposition(),
        home_score: state.home_score,
        away_score: state.away_score,
        minutes_played: minutes_played.cloned(),
        idempotency_key: idempotency_key.to_string(),
        timestamp: event.timestamp.unix_timestamp(),
    }
}

/// Whether a non-success status is worth another attempt.
pub fn is_transient_status(status_code: Option<u16>) -> bool {
    match status_code {
        None => true,
        Some(code) => code >= 500 || code == 429 || code == 408,
    }
}

enum AttemptFailure {
    Transient(String),
    Permanent(String),
}

/// Delivers payloads at most once per idempotency key.
#[derive(Clone)]
pub struct DispatchPipeline {
    consent: Arc<dyn ConsentGate>,
    gateway: Arc<dyn DeliveryGateway>,
    records: Arc<dyn DispatchStore>,
    policy: RetryPolicy,
}

impl DispatchPipeline {
    pub fn new(
        consent: Arc<dyn ConsentGate>,
        gateway: Arc<dyn DeliveryGateway>,
        records: Arc<dyn DispatchStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            consent,
            gateway,
            records,
            policy,
        }
    }

    pub async fn dispatch(&self, request: DispatchRequest<'_>) -> DispatchOutcome {
        let key = resolve_idempotency_key(request.event);
        let payload = build_payload(&request, &key);
        let fingerprint = match payload.fingerprint() {
            Ok(f) => f,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to fingerprint payload");
                return DispatchOutcome::Failed {
                    retryable: false,
                    reason: format!("payload serialization failed: {e}"),
                };
            }
        };

        match self.records.claim(&key).await {
            Ok(ClaimOutcome::Claimed) => {}
            Ok(ClaimOutcome::Delivered(record)) => {
                info!(key = %key, "Already delivered, returning stored record");
                if record.payload_fingerprint != fingerprint {
                    warn!(key = %key, "Replayed key carries a different payload");
                }
                return DispatchOutcome::Delivered {
                    record,
                    replayed: true,
                };
            }
            Ok(ClaimOutcome::InFlight) => {
                debug!(key = %key, "Delivery already in flight");
                return DispatchOutcome::InFlight;
            }
            Err(e) => {
                error!(key = %key, error = %e, "Dispatch store unavailable");
                return DispatchOutcome::Failed {
                    retryable: true,
                    reason: e.to_string(),
                };
            }
        }

        let context = DispatchContext {
            match_id: request.event.match_id.clone(),
            idempotency_key: key.clone(),
            category: request.classification.category,
            competition: request.competition.map(str::to_string),
        };
        let decision = self.consent.evaluate(&payload, &context).await;
        if !decision.allowed {
            info!(
                key = %key,
                reason = decision.reason.as_deref().unwrap_or("none"),
                "Dispatch blocked by consent"
            );
            self.release(&key).await;
            return DispatchOutcome::Blocked {
                reason: decision.reason,
            };
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.gateway
                    .deliver(&payload, &key, self.policy.attempt_timeout),
            )
            .await
            {
                Ok(Ok(response)) if response.success => {
                    let record = DispatchRecord {
                        idempotency_key: key.clone(),
                        payload_fingerprint: fingerprint,
                        delivered_at: OffsetDateTime::now_utc(),
                        result: DeliveryResult {
                            status_code: response.status_code,
                            attempts: attempt,
                        },
                    };
                    if let Err(e) = self.records.commit(record.clone()).await {
                        // The claim stays held so the fact is not sent twice.
                        error!(key = %key, error = %e, "Delivered but failed to commit record");
                    }
                    info!(key = %key, attempts = attempt, "Dispatch delivered");
                    return DispatchOutcome::Delivered {
                        record,
                        replayed: false,
                    };
                }
                Ok(Ok(response)) => {
                    let reason = match response.status_code {
                        Some(code) => format!("gateway answered {code}"),
                        None => "gateway reported failure".to_string(),
                    };
                    if is_transient_status(response.status_code) {
                        AttemptFailure::Transient(reason)
                    } else {
                        AttemptFailure::Permanent(reason)
                    }
                }
                Ok(Err(e @ GatewayError::Transport(_))) => AttemptFailure::Transient(e.to_string()),
                Ok(Err(e @ GatewayError::Malformed(_))) => AttemptFailure::Permanent(e.to_string()),
                Err(_) => AttemptFailure::Transient(format!(
                    "attempt timed out after {:?}",
                    self.policy.attempt_timeout
                )),
            };

            match failure {
                AttemptFailure::Permanent(reason) => {
                    warn!(key = %key, attempt = attempt, reason = %reason, "Permanent delivery failure");
                    self.release(&key).await;
                    return DispatchOutcome::Failed {
                        retryable: false,
                        reason,
                    };
                }
                AttemptFailure::Transient(reason) if attempt >= max_attempts => {
                    warn!(key = %key, attempts = attempt, reason = %reason, "Delivery attempts exhausted");
                    self.release(&key).await;
                    return DispatchOutcome::Failed {
                        retryable: true,
                        reason,
                    };
                }
                AttemptFailure::Transient(reason) => {
                    let delay = self.policy.backoff(attempt - 1);
                    debug!(
                        key = %key,
                        attempt = attempt,
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Transient delivery failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn release(&self, key: &str) {
        if let Err(e) = self.records.release(key).await {
            error!(key = %key, error = %e, "Failed to release dispatch claim");
        }
    }
}
