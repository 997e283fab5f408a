//! Webhook server for the WhatsApp Cloud API
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook`
//! accepts event notifications and acknowledges before any processing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{Result, WhatsAppError};
use crate::queue::DispatchQueue;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub queue: DispatchQueue,
}

/// Query string of the verification handshake
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Create webhook router
pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Echo the challenge when the caller knows the verify token.
///
/// Anything else, including a query string that does not parse, is a 403.
async fn verify_webhook(
    State(state): State<Arc<WebhookState>>,
    params: std::result::Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!("[WEBHOOK] Verification failed: {}", e);
            return (StatusCode::FORBIDDEN, "Invalid token").into_response();
        }
    };

    if params.verify_token.as_deref() == Some(state.verify_token.as_str()) {
        info!("[WEBHOOK] Verified (mode={:?})", params.mode);
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("[WEBHOOK] Verification failed: invalid token");
        (StatusCode::FORBIDDEN, "Invalid token").into_response()
    }
}

/// Acknowledge at once; processing happens on the dispatch queue
async fn receive_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = check_signature(state.app_secret.as_deref(), &headers, &body) {
        warn!("[WEBHOOK] Dropping event: {}", e);
        return ack();
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            state.queue.enqueue(payload);
        }
        Err(e) => error!("[ERROR] Webhook body is not JSON: {}", e),
    }

    ack()
}

fn ack() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Enforce `X-Hub-Signature-256` when an app secret is configured
fn check_signature(app_secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let Some(secret) = app_secret else {
        return Ok(());
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WhatsAppError::SignatureVerificationFailed)?;

    if verify_signature(secret, body, signature) {
        Ok(())
    } else {
        Err(WhatsAppError::SignatureVerificationFailed)
    }
}

/// Verify a `sha256=<hex>` HMAC of the raw body
pub fn verify_signature(app_secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: WebhookState,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, state: WebhookState) -> Self {
        Self { addr, state }
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_webhook_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| WhatsAppError::Config(format!("bind {}: {}", self.addr, e)))?;

        info!("[SERVER] Webhook listening on {}", self.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| WhatsAppError::Server(e.to_string()))?;

        Ok(())
    }
}
