//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use matchfeed_core::MatchFeed;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// The event pipeline and its match sessions.
    pub feed: Arc<MatchFeed>,
    /// Reloadable configuration sections (updated via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(feed: MatchFeed, config: SharedConfig) -> Self {
        Self {
            feed: Arc::new(feed),
            config,
        }
    }
}
