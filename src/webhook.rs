use crate::delivery_cache::DeliveryCache;
use crate::router::{EventRouter, WebhookEvent};
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Clone)]
pub struct AppState {
    pub router: EventRouter,
    pub webhook_secret: Option<String>,
    pub deliveries: DeliveryCache,
}

pub fn build_router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(handle_webhook))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let received_at = Utc::now();
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = header_str(&headers, SIGNATURE_HEADER).unwrap_or("");
        if !verify_signature(secret, &body, signature) {
            warn!("Rejecting webhook with missing or invalid signature");
            return (StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let Some(event_name) = header_str(&headers, EVENT_HEADER) else {
        warn!("Webhook is missing the {} header", EVENT_HEADER);
        return (StatusCode::BAD_REQUEST, "missing event header");
    };

    let event = match WebhookEvent::parse(event_name, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse {} webhook payload: {}", event_name, e);
            return (StatusCode::BAD_REQUEST, "invalid JSON");
        }
    };

    if let Some(delivery_id) = header_str(&headers, DELIVERY_HEADER) {
        if !state.deliveries.insert(delivery_id) {
            info!("Delivery {} already handled, skipping", delivery_id);
            return (StatusCode::OK, "duplicate delivery");
        }
    }

    debug!("Accepted {} webhook", event_name);
    let router = state.router.clone();
    tokio::spawn(async move {
        router.dispatch(event, received_at).await;
    });

    (StatusCode::ACCEPTED, "accepted")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Checks a `sha256=<hex>` signature of `payload`. The comparison is constant time.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook listen address")?;
    info!("Webhook server listening on {}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutting down webhook server");
        })
        .await
        .context("webhook server exited unexpectedly")
}
