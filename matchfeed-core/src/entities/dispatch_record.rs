//! Dispatch records: the idempotency store shared by every match.
//!
//! A key moves through two states. `claim` reserves it for one in-flight
//! delivery; `commit` turns the reservation into a permanent record;
//! `release` drops the reservation so a later call may try again. Claiming
//! is check-and-set atomic, so two concurrent duplicates cannot both
//! deliver.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::framework::DatabaseProcessor;

/// How the far end acknowledged a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryResult {
    pub status_code: Option<u16>,
    pub attempts: u32,
}

/// Permanent proof that a key was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub idempotency_key: String,
    pub payload_fingerprint: String,
    pub delivered_at: OffsetDateTime,
    pub result: DeliveryResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns the key and must `commit` or `release` it.
    Claimed,
    /// The key was delivered before.
    Delivered(DispatchRecord),
    /// Another attempt holds the key right now.
    InFlight,
}

#[derive(Debug, Error)]
pub enum DispatchStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("idempotency key {0} is not claimed")]
    NotClaimed(String),
}

#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn claim(&self, idempotency_key: &str) -> Result<ClaimOutcome, DispatchStoreError>;

    async fn commit(&self, record: DispatchRecord) -> Result<(), DispatchStoreError>;

    async fn release(&self, idempotency_key: &str) -> Result<(), DispatchStoreError>;

    async fn get(&self, idempotency_key: &str) -> Result<Option<DispatchRecord>, DispatchStoreError>;

    /// Delete delivered records older than `cutoff`. In-flight claims are
    /// kept. Returns how many records went.
    async fn purge_delivered_before(&self, cutoff: OffsetDateTime) -> Result<u64, DispatchStoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Slot {
    InFlight,
    Delivered(DispatchRecord),
}

/// Process-local store. Every operation runs under one lock.
#[derive(Debug, Default)]
pub struct MemoryDispatchStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn delivered_count(&self) -> usize {
        self.slots()
            .values()
            .filter(|s| matches!(s, Slot::Delivered(_)))
            .count()
    }
}

#[async_trait]
impl DispatchStore for MemoryDispatchStore {
    async fn claim(&self, idempotency_key: &str) -> Result<ClaimOutcome, DispatchStoreError> {
        let mut slots = self.slots();
        match slots.get(idempotency_key) {
            Some(Slot::Delivered(record)) => Ok(ClaimOutcome::Delivered(record.clone())),
            Some(Slot::InFlight) => Ok(ClaimOutcome::InFlight),
            None => {
                slots.insert(idempotency_key.to_string(), Slot::InFlight);
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn commit(&self, record: DispatchRecord) -> Result<(), DispatchStoreError> {
        let mut slots = self.slots();
        match slots.get_mut(&record.idempotency_key) {
            Some(slot @ Slot::InFlight) => {
                *slot = Slot::Delivered(record);
                Ok(())
            }
            _ => Err(DispatchStoreError::NotClaimed(record.idempotency_key)),
        }
    }

    async fn release(&self, idempotency_key: &str) -> Result<(), DispatchStoreError> {
        let mut slots = self.slots();
        if let Some(Slot::InFlight) = slots.get(idempotency_key) {
            slots.remove(idempotency_key);
        }
        Ok(())
    }

    async fn get(&self, idempotency_key: &str) -> Result<Option<DispatchRecord>, DispatchStoreError> {
        Ok(match self.slots().get(idempotency_key) {
            Some(Slot::Delivered(record)) => Some(record.clone()),
            _ => None,
        })
    }

    async fn purge_delivered_before(&self, cutoff: OffsetDateTime) -> Result<u64, DispatchStoreError> {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Delivered(record) => record.delivered_at >= cutoff,
            Slot::InFlight => true,
        });
        Ok((before - slots.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

/// Raw `dispatch_records` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DispatchRecordRow {
    pub idempotency_key: String,
    pub state: String,
    pub payload_fingerprint: Option<String>,
    pub delivered_at: Option<OffsetDateTime>,
    pub status_code: Option<i32>,
    pub attempts: i32,
}

impl DispatchRecordRow {
    fn into_record(self) -> Option<DispatchRecord> {
        let DispatchRecordRow {
            idempotency_key,
            state,
            payload_fingerprint,
            delivered_at,
            status_code,
            attempts,
        } = self;
        match (state.as_str(), payload_fingerprint, delivered_at) {
            ("delivered", Some(payload_fingerprint), Some(delivered_at)) => Some(DispatchRecord {
                idempotency_key,
                payload_fingerprint,
                delivered_at,
                result: DeliveryResult {
                    status_code: status_code.and_then(|c| u16::try_from(c).ok()),
                    attempts: u32::try_from(attempts).unwrap_or_default(),
                },
            }),
            _ => None,
        }
    }
}

/// Reserve a key, taking over reservations older than `lease`.
#[derive(Debug, Clone)]
pub struct ClaimDispatchKey {
    pub idempotency_key: String,
    pub lease: Duration,
}

#[derive(Debug, Clone)]
pub struct GetDispatchRecord {
    pub idempotency_key: String,
}

/// Turn an in-flight reservation into a delivered record.
#[derive(Debug, Clone)]
pub struct CommitDispatchRecord {
    pub record: DispatchRecord,
}

#[derive(Debug, Clone)]
pub struct ReleaseDispatchKey {
    pub idempotency_key: String,
}

/// Delete delivered records older than `delivered_before`.
#[derive(Debug, Clone)]
pub struct PurgeDispatchRecords {
    pub delivered_before: OffsetDateTime,
}

impl Processor<ClaimDispatchKey> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDispatchKey")]
    async fn process(&self, query: ClaimDispatchKey) -> Result<bool, sqlx::Error> {
        let claimed = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO dispatch_records (idempotency_key, state, claimed_at)
            VALUES ($1, 'in_flight', now())
            ON CONFLICT (idempotency_key) DO UPDATE
                SET claimed_at = now()
                WHERE dispatch_records.state = 'in_flight'
                  AND dispatch_records.claimed_at < now() - make_interval(secs => $2)
            RETURNING idempotency_key
            "#,
        )
        .bind(&query.idempotency_key)
        .bind(query.lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.is_some())
    }
}

impl Processor<GetDispatchRecord> for DatabaseProcessor {
    type Output = Option<DispatchRecordRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDispatchRecord")]
    async fn process(&self, query: GetDispatchRecord) -> Result<Option<DispatchRecordRow>, sqlx::Error> {
        sqlx::query_as::<_, DispatchRecordRow>(
            r#"
            SELECT idempotency_key, state, payload_fingerprint, delivered_at, status_code, attempts
            FROM dispatch_records
            WHERE idempotency_key = $1
            "#,
        )
        .bind(&query.idempotency_key)
        .fetch_optional(&self.pool)
        .await
    }
}

impl Processor<CommitDispatchRecord> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CommitDispatchRecord")]
    async fn process(&self, query: CommitDispatchRecord) -> Result<u64, sqlx::Error> {
        let record = query.record;
        let result = sqlx::query(
            r#"
            UPDATE dispatch_records
            SET state = 'delivered',
                payload_fingerprint = $2,
                delivered_at = $3,
                status_code = $4,
                attempts = $5
            WHERE idempotency_key = $1 AND state = 'in_flight'
            "#,
        )
        .bind(&record.idempotency_key)
        .bind(&record.payload_fingerprint)
        .bind(record.delivered_at)
        .bind(record.result.status_code.map(i32::from))
        .bind(i32::try_from(record.result.attempts).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl Processor<ReleaseDispatchKey> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleaseDispatchKey")]
    async fn process(&self, query: ReleaseDispatchKey) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM dispatch_records
            WHERE idempotency_key = $1 AND state = 'in_flight'
            "#,
        )
        .bind(&query.idempotency_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl Processor<PurgeDispatchRecords> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeDispatchRecords")]
    async fn process(&self, query: PurgeDispatchRecords) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM dispatch_records
            WHERE state = 'delivered' AND delivered_at < $1
            "#,
        )
        .bind(query.delivered_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Store backed by the `dispatch_records` table.
#[derive(Debug, Clone)]
pub struct PgDispatchStore {
    db: DatabaseProcessor,
    lease: Duration,
}

impl PgDispatchStore {
    /// `lease` bounds how long a crashed attempt can hold a key.
    pub fn new(db: DatabaseProcessor, lease: Duration) -> Self {
        Self { db, lease }
    }

    async fn try_claim(&self, idempotency_key: &str) -> Result<bool, DispatchStoreError> {
        Ok(self
            .db
            .process(ClaimDispatchKey {
                idempotency_key: idempotency_key.to_string(),
                lease: self.lease,
            })
            .await?)
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn claim(&self, idempotency_key: &str) -> Result<ClaimOutcome, DispatchStoreError> {
        // A second try covers a reservation released between the two queries.
        for _ in 0..2 {
            if self.try_claim(idempotency_key).await? {
                return Ok(ClaimOutcome::Claimed);
            }
            let row = self
                .db
                .process(GetDispatchRecord {
                    idempotency_key: idempotency_key.to_string(),
                })
                .await?;
            match row {
                Some(row) => {
                    return Ok(match row.into_record() {
                        Some(record) => ClaimOutcome::Delivered(record),
                        None => ClaimOutcome::InFlight,
                    });
                }
                None => debug!(key = %idempotency_key, "Claim released concurrently, retrying"),
            }
        }
        Ok(ClaimOutcome::InFlight)
    }

    async fn commit(&self, record: DispatchRecord) -> Result<(), DispatchStoreError> {
        let key = record.idempotency_key.clone();
        let updated = self.db.process(CommitDispatchRecord { record }).await?;
        if updated == 0 {
            return Err(DispatchStoreError::NotClaimed(key));
        }
        Ok(())
    }

    async fn release(&self, idempotency_key: &str) -> Result<(), DispatchStoreError> {
        self.db
            .process(ReleaseDispatchKey {
                idempotency_key: idempotency_key.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn get(&self, idempotency_key: &str) -> Result<Option<DispatchRecord>, DispatchStoreError> {
        let row = self
            .db
            .process(GetDispatchRecord {
                idempotency_key: idempotency_key.to_string(),
            })
            .await?;
        Ok(row.and_then(DispatchRecordRow::into_record))
    }

    async fn purge_delivered_before(&self, cutoff: OffsetDateTime) -> Result<u64, DispatchStoreError> {
        Ok(self
            .db
            .process(PurgeDispatchRecords {
                delivered_before: cutoff,
            })
            .await?)
    }
}
