//! In-process app wiring for handler tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use matchfeed_core::MatchFeed;
use matchfeed_core::config::FeedConfig;
use matchfeed_core::entities::dispatch_record::MemoryDispatchStore;
use matchfeed_core::ports::{DeliveryGateway, DeliveryResponse, GatewayError, MatchMeta};
use matchfeed_sdk::objects::{DispatchPayload, EventType, IncomingEvent, PeriodMarker};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tower::ServiceExt;

use crate::adapters::{ConfigTabularStore, OptOutConsentGate};
use crate::config::runtime::{ConsentConfig, ServerConfig, SharedConfig};
use crate::server::build_router;
use crate::state::AppState;

#[derive(Default)]
pub struct RecordingGateway {
    delivered: Mutex<Vec<DispatchPayload>>,
}

impl RecordingGateway {
    pub fn delivered(&self) -> Vec<DispatchPayload> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn deliver(
        &self,
        payload: &DispatchPayload,
        _: &str,
        _: Duration,
    ) -> Result<DeliveryResponse, GatewayError> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(DeliveryResponse {
            success: true,
            status_code: Some(200),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
}

impl TestApp {
    /// Home fixture `m-1`, "Jordan Smith" withheld.
    pub fn new(ingest_secret: Option<&str>) -> Self {
        let meta = MatchMeta {
            is_home: true,
            opponent: "Rovers".to_string(),
            competition: "League".to_string(),
            venue: "Home Park".to_string(),
        };
        let config = SharedConfig {
            server: Arc::new(RwLock::new(ServerConfig::new(
                SocketAddr::from(([127, 0, 0, 1], 0)),
                ingest_secret.map(str::to_string),
            ))),
            consent: Arc::new(RwLock::new(ConsentConfig::new(
                vec!["Jordan Smith".to_string()],
                Vec::new(),
            ))),
            matches: Arc::new(RwLock::new(
                [("m-1".to_string(), meta)].into_iter().collect(),
            )),
        };

        let gateway = Arc::new(RecordingGateway::default());
        let feed = MatchFeed::new(
            FeedConfig::default(),
            Arc::new(ConfigTabularStore::new(config.matches.clone())),
            Arc::new(OptOutConsentGate::new(config.consent.clone())),
            gateway.clone(),
            Arc::new(MemoryDispatchStore::new()),
        );
        Self {
            state: AppState::new(feed, config),
            gateway,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

pub fn kickoff(match_id: &str, starters: &[&str]) -> IncomingEvent {
    let mut event = IncomingEvent::new(match_id, EventType::PeriodTransition, 0);
    event.period = Some(PeriodMarker::Kickoff);
    event.starters = starters.iter().map(|s| s.to_string()).collect();
    event
}

pub async fn post_event(router: &Router, event: &IncomingEvent) -> Response {
    let request = Request::post("/events")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(event).unwrap()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
