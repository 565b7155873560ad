use std::sync::Arc;

use async_trait::async_trait;
use matchfeed_core::ports::{ConsentDecision, ConsentGate, DispatchContext};
use matchfeed_sdk::objects::DispatchPayload;
use tokio::sync::RwLock;

use crate::config::runtime::ConsentConfig;

/// Blocks payloads naming a withheld player, including the keys of a
/// minutes table, or belonging to a blocked competition. The lists are
/// re-read on every call, so SIGHUP takes effect immediately.
pub struct OptOutConsentGate {
    config: Arc<RwLock<ConsentConfig>>,
}

impl OptOutConsentGate {
    pub fn new(config: Arc<RwLock<ConsentConfig>>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConsentGate for OptOutConsentGate {
    async fn evaluate(&self, payload: &DispatchPayload, context: &DispatchContext) -> ConsentDecision {
        let config = self.config.read().await;

        if let Some(competition) = context.competition.as_deref() {
            if config.is_blocked_competition(competition) {
                return ConsentDecision::deny(format!("competition {competition} is not published"));
            }
        }

        let named = [
            payload.player_name.as_deref(),
            payload.assist_by.as_deref(),
            payload.player_off.as_deref(),
            payload.player_on.as_deref(),
        ];
        let tabled = payload
            .minutes_played
            .iter()
            .flat_map(|minutes| minutes.keys().map(String::as_str));
        match named
            .into_iter()
            .flatten()
            .chain(tabled)
            .find(|p| config.is_withheld(p))
        {
            Some(player) => ConsentDecision::deny(format!("{player} has not consented to publication")),
            None => ConsentDecision::allow(),
        }
    }
}
