use std::time::Duration;

use async_trait::async_trait;
use matchfeed_core::ports::{DeliveryGateway, DeliveryResponse, GatewayError};
use matchfeed_sdk::objects::DispatchPayload;
use matchfeed_sdk::signature::{IDEMPOTENCY_HEADER, SIGNATURE_HEADER, SignedObject};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

/// Posts signed payloads to a webhook URL.
pub struct HttpDeliveryGateway {
    http_client: reqwest::Client,
    webhook_url: Url,
    secret: Box<[u8]>,
}

impl HttpDeliveryGateway {
    pub fn new(webhook_url: Url, secret: &[u8]) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            webhook_url,
            secret: secret.to_vec().into_boxed_slice(),
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpDeliveryGateway {
    async fn deliver(
        &self,
        payload: &DispatchPayload,
        idempotency_key: &str,
        timeout: Duration,
    ) -> Result<DeliveryResponse, GatewayError> {
        let signed = SignedObject::new(payload.clone(), &self.secret)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let header = signed.to_header();

        let response = self
            .http_client
            .post(self.webhook_url.clone())
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, header)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .body(signed.json)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(
            key = %idempotency_key,
            status = status.as_u16(),
            "Webhook answered"
        );
        Ok(DeliveryResponse {
            success: status.is_success(),
            status_code: Some(status.as_u16()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use matchfeed_sdk::objects::MatchPhase;
    use matchfeed_sdk::signature::verify_webhook;

    use super::*;

    #[derive(Clone)]
    struct Receiver {
        status: StatusCode,
        seen: Arc<Mutex<Vec<(HeaderMap, String)>>>,
    }

    async fn receive(State(receiver): State<Receiver>, headers: HeaderMap, body: String) -> StatusCode {
        receiver.seen.lock().unwrap().push((headers, body));
        receiver.status
    }

    async fn spawn_receiver(status: StatusCode) -> (Url, Receiver) {
        let receiver = Receiver {
            status,
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(receiver.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (Url::parse(&format!("http://{addr}/hook")).unwrap(), receiver)
    }

    fn payload() -> DispatchPayload {
        DispatchPayload {
            event_type: "goal".to_string(),
            match_id: "m-1".to_string(),
            minute: 12,
            player_name: Some("Ana".to_string()),
            assist_by: None,
            card_type: None,
            first_yellow_minute: None,
            player_off: None,
            player_on: None,
            phase: MatchPhase::FirstHalf,
            is_opposition: false,
            home_score: 1,
            away_score: 0,
            minutes_played: None,
            idempotency_key: "m-1:abc".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_delivery_is_signed() {
        let (url, receiver) = spawn_receiver(StatusCode::OK).await;
        let gateway = HttpDeliveryGateway::new(url, b"hook-secret");

        let response = gateway
            .deliver(&payload(), "m-1:abc", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.status_code, Some(200));

        let seen = receiver.seen.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(headers[IDEMPOTENCY_HEADER], "m-1:abc");
        let signature = headers[SIGNATURE_HEADER].to_str().unwrap();
        let received: DispatchPayload = verify_webhook(signature, body, b"hook-secret").unwrap();
        assert_eq!(received, payload());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _receiver) = spawn_receiver(StatusCode::SERVICE_UNAVAILABLE).await;
        let gateway = HttpDeliveryGateway::new(url, b"hook-secret");

        let response = gateway
            .deliver(&payload(), "m-1:abc", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.status_code, Some(503));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/hook")).unwrap();
        let gateway = HttpDeliveryGateway::new(url, b"hook-secret");

        let result = gateway
            .deliver(&payload(), "m-1:abc", Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }
}
