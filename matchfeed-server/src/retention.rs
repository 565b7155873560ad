//! Periodic purge of old dispatch records.

use std::sync::Arc;
use std::time::Duration;

use matchfeed_core::entities::{DispatchStore, DispatchStoreError};
use time::OffsetDateTime;
use tokio::sync::Notify;

const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Delete records delivered more than `retention` ago.
pub async fn purge_once(
    records: &dyn DispatchStore,
    retention: Duration,
) -> Result<u64, DispatchStoreError> {
    let cutoff = time::Duration::try_from(retention)
        .ok()
        .and_then(|r| OffsetDateTime::now_utc().checked_sub(r));
    match cutoff {
        Some(cutoff) => records.purge_delivered_before(cutoff).await,
        None => Ok(0),
    }
}

/// Spawns a task purging expired records every `min(retention, 1h)`.
///
/// Returns a Notify that stops the task.
pub fn spawn_retention_task(records: Arc<dyn DispatchStore>, retention: Duration) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();
    let period = retention.min(MAX_PURGE_INTERVAL);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    match purge_once(records.as_ref(), retention).await {
                        Ok(0) => tracing::debug!("No dispatch records to purge"),
                        Ok(purged) => tracing::info!(purged, "Purged expired dispatch records"),
                        Err(e) => tracing::warn!(error = %e, "Failed to purge dispatch records"),
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Retention task shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}

#[cfg(test)]
mod tests {
    use matchfeed_core::entities::{DeliveryResult, DispatchRecord, MemoryDispatchStore};

    use super::*;

    async fn delivered(store: &MemoryDispatchStore, key: &str, age: time::Duration) {
        store.claim(key).await.unwrap();
        store
            .commit(DispatchRecord {
                idempotency_key: key.to_string(),
                payload_fingerprint: "fp".to_string(),
                delivered_at: OffsetDateTime::now_utc() - age,
                result: DeliveryResult {
                    status_code: Some(200),
                    attempts: 1,
                },
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_purge_once_drops_only_expired() {
        let store = MemoryDispatchStore::new();
        delivered(&store, "m-1:old", time::Duration::days(10)).await;
        delivered(&store, "m-1:new", time::Duration::hours(1)).await;

        let purged = purge_once(&store, Duration::from_secs(7 * 24 * 3600)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("m-1:old").await.unwrap().is_none());
        assert!(store.get("m-1:new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_absurd_retention_purges_nothing() {
        let store = MemoryDispatchStore::new();
        delivered(&store, "m-1:old", time::Duration::days(10)).await;
        assert_eq!(purge_once(&store, Duration::MAX).await.unwrap(), 0);
    }
}
