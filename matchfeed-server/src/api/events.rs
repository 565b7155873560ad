use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use kanau::processor::Processor;
use matchfeed_sdk::objects::IngestResponse;

use super::ApiError;
use crate::api::extractors::EventBody;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(ingest_event))
}

/// `POST /events`: classify, apply and dispatch one event.
///
/// Dispatch failures and anomalies are reported in the body with a 200;
/// only an event that fails validation is rejected.
async fn ingest_event(
    State(state): State<AppState>,
    EventBody(event): EventBody,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.feed.process(event).await?;
    Ok(Json(IngestResponse::from(&report)))
}
