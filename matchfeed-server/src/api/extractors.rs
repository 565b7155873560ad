//! Request body extraction for `POST /events`.
//!
//! When `[server] ingest_secret` is configured the body must be signed:
//!
//! ```text
//! Matchfeed-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! with the signature computed as `HMAC-SHA256("{timestamp}.{json_body}", ingest_secret)`.
//! Without a secret the body is plain JSON.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use matchfeed_sdk::objects::IncomingEvent;
use matchfeed_sdk::signature::{SIGNATURE_HEADER, SignatureError, SignedObject};

use crate::state::AppState;

const MAX_BODY_BYTES: usize = 256 * 1024;

/// A decoded, and if required authenticated, incoming event.
pub struct EventBody(pub IncomingEvent);

#[derive(Debug, thiserror::Error)]
pub enum EventBodyError {
    #[error("missing Matchfeed-Signature header")]
    MissingHeader,
    #[error("invalid Matchfeed-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for EventBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for EventBodyError {
    fn into_response(self) -> Response {
        let status = match self {
            EventBodyError::MissingHeader | EventBodyError::VerificationFailed => {
                StatusCode::UNAUTHORIZED
            }
            EventBodyError::InvalidHeader
            | EventBodyError::InvalidBase64
            | EventBodyError::BodyReadError
            | EventBodyError::JsonError(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

impl FromRequest<AppState> for EventBody {
    type Rejection = EventBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .map(|v| v.to_str().map(str::to_owned))
            .transpose()
            .map_err(|_| EventBodyError::InvalidHeader)?;

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| EventBodyError::BodyReadError)?;
        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| EventBodyError::BodyReadError)?;

        let server = state.config.server.read().await;
        let Some(secret) = server.ingest_secret() else {
            let event = serde_json::from_str(&json).map_err(EventBodyError::JsonError)?;
            return Ok(EventBody(event));
        };

        let header_value = header_value.ok_or(EventBodyError::MissingHeader)?;
        let signed = SignedObject::<IncomingEvent>::from_header_and_body(&header_value, json)?;
        let event = signed.verify(secret)?;
        drop(server);

        Ok(EventBody(event))
    }
}
