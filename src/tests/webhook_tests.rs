use crate::delivery_cache::DeliveryCache;
use crate::router::EventRouter;
use crate::tests::support::*;
use crate::webhook::{build_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "It's a Secret to Everybody";

fn app(harness: &Harness) -> Router {
    let state = AppState {
        router: EventRouter::new(Arc::new(harness.build())),
        webhook_secret: Some(SECRET.to_string()),
        deliveries: DeliveryCache::new(Duration::from_secs(3600)),
    };
    build_router(state, "/webhook")
}

fn sign(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn delivery(event: &str, delivery_id: &str, payload: &[u8], signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", delivery_id);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(payload.to_vec())).unwrap()
}

/// Dispatch runs on a spawned task, so wait for its posts.
async fn wait_for_posts(harness: &Harness, expected: usize) {
    for _ in 0..100 {
        if harness.gateway.attempts() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} posts, saw {}",
        expected,
        harness.gateway.attempts()
    );
}

#[tokio::test]
async fn test_signed_delivery_is_accepted_and_dispatched() {
    let harness = Harness::default();
    let app = app(&harness);
    let payload = discussion_payload("alice", "How does caching work?", "I'm confused.").to_string();

    let response = app
        .oneshot(delivery(
            "discussion",
            "delivery-1",
            payload.as_bytes(),
            Some(sign(payload.as_bytes())),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    wait_for_posts(&harness, 2).await;
    assert_eq!(harness.gateway.posts()[0].0, discussion_target());
}

#[tokio::test]
async fn test_bad_or_missing_signature_is_rejected() {
    let harness = Harness::default();
    let payload = comment_payload("carol", "@discussbot eviction?").to_string();

    let tampered = app(&harness)
        .oneshot(delivery(
            "discussion_comment",
            "delivery-2",
            payload.as_bytes(),
            Some(sign(b"something else")),
        ))
        .await
        .unwrap();
    assert_eq!(tampered.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app(&harness)
        .oneshot(delivery("discussion_comment", "delivery-3", payload.as_bytes(), None))
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.gateway.attempts(), 0);
}

#[tokio::test]
async fn test_duplicate_delivery_is_not_dispatched_twice() {
    let harness = Harness::default();
    let app = app(&harness);
    let payload = pull_request_payload("bob").to_string();
    let signature = sign(payload.as_bytes());

    let first = app
        .clone()
        .oneshot(delivery("pull_request", "delivery-4", payload.as_bytes(), Some(signature.clone())))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app
        .oneshot(delivery("pull_request", "delivery-4", payload.as_bytes(), Some(signature)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    wait_for_posts(&harness, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.gateway.attempts(), 1);
}

#[tokio::test]
async fn test_malformed_deliveries_are_bad_requests() {
    let harness = Harness::default();

    let invalid_json = app(&harness)
        .oneshot(delivery("discussion", "delivery-5", b"{not json", Some(sign(b"{not json"))))
        .await
        .unwrap();
    assert_eq!(invalid_json.status(), StatusCode::BAD_REQUEST);

    let payload = br#"{"action":"created"}"#;
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-hub-signature-256", sign(payload))
        .body(Body::from(payload.to_vec()))
        .unwrap();
    let missing_event = app(&harness).oneshot(request).await.unwrap();
    assert_eq!(missing_event.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_events_are_accepted_and_ignored() {
    let harness = Harness::default();
    let payload = br#"{"action":"labeled"}"#;

    let response = app(&harness)
        .oneshot(delivery("issues", "delivery-6", payload, Some(sign(payload))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.gateway.attempts(), 0);
}

#[tokio::test]
async fn test_healthz() {
    let harness = Harness::default();
    let response = app(&harness)
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
