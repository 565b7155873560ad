use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use matchfeed_core::ports::{MatchMeta, TabularStore, TabularStoreError};
use matchfeed_core::processors::StatField;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::runtime::MatchDirectory;

/// Fixture metadata from the reloadable config, player stats kept in memory.
pub struct ConfigTabularStore {
    matches: Arc<RwLock<MatchDirectory>>,
    stats: Mutex<HashMap<String, BTreeMap<&'static str, i64>>>,
}

impl ConfigTabularStore {
    pub fn new(matches: Arc<RwLock<MatchDirectory>>) -> Self {
        Self {
            matches,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// All columns recorded for `player`.
    #[cfg(test)]
    pub fn player_stats(&self, player: &str) -> BTreeMap<&'static str, i64> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for ConfigTabularStore {
    async fn get_match_meta(&self, match_id: &str) -> Result<Option<MatchMeta>, TabularStoreError> {
        Ok(self.matches.read().await.get(match_id).cloned())
    }

    async fn upsert_player_stat(
        &self,
        player: &str,
        field: StatField,
        delta: i64,
    ) -> Result<(), TabularStoreError> {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let value = stats
            .entry(player.to_string())
            .or_default()
            .entry(field.as_str())
            .or_default();
        *value += delta;
        debug!(player = %player, field = %field, value = *value, "Player stat updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Arc<RwLock<MatchDirectory>> {
        let meta = MatchMeta {
            is_home: false,
            opponent: "Rovers".to_string(),
            competition: "Cup".to_string(),
            venue: "Rovers Park".to_string(),
        };
        Arc::new(RwLock::new([("m-1".to_string(), meta)].into_iter().collect()))
    }

    #[tokio::test]
    async fn test_meta_follows_reloads() {
        let matches = directory();
        let store = ConfigTabularStore::new(matches.clone());
        assert!(!store.get_match_meta("m-1").await.unwrap().unwrap().is_home);

        matches.write().await.clear();
        assert!(store.get_match_meta("m-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let store = ConfigTabularStore::new(directory());
        store.upsert_player_stat("Ana", StatField::Goals, 1).await.unwrap();
        store.upsert_player_stat("Ana", StatField::Goals, 1).await.unwrap();
        store.upsert_player_stat("Ana", StatField::Minutes, 90).await.unwrap();

        let stats = store.player_stats("Ana");
        assert_eq!(stats.get("goals"), Some(&2));
        assert_eq!(stats.get("minutes"), Some(&90));
        assert!(store.player_stats("Bea").is_empty());
    }
}
