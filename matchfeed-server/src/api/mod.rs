//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /events`                – ingest one live event
//! - `GET /matches/{match_id}`    – score, phase and minutes for a match
//! - `DELETE /matches/{match_id}` – forget a finished match

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use matchfeed_core::events::InvalidEventError;

pub mod events;
pub mod extractors;
pub mod matches;

#[cfg(test)]
pub(crate) mod test_support;

/// Errors returned by the API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] InvalidEventError),
    #[error("match not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}
