use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use matchfeed_sdk::objects::MatchSnapshotResponse;
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/matches/{match_id}", get(get_match).delete(evict_match))
}

#[derive(Debug, Deserialize)]
struct SnapshotQuery {
    minute: Option<u32>,
}

/// `GET /matches/{match_id}?minute=N`
///
/// Minutes are projected to `minute` for a live match, defaulting to the
/// latest minute seen. Finished matches return their final figures.
async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .feed
        .snapshot(&match_id, query.minute)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(MatchSnapshotResponse::from(snapshot)))
}

/// `DELETE /matches/{match_id}`: only finished matches can be forgotten.
async fn evict_match(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.feed.evict_archived(&match_id) {
        return Err(ApiError::NotFound);
    }
    tracing::info!(match_id = %match_id, "Archived match evicted");
    Ok(StatusCode::NO_CONTENT)
}
