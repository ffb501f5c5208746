//! Tests for the webhook HTTP surface
//!
//! Signature checks, payload validation and dispatch of text events

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::{MockBackend, Outgoing, RecordingOutbound, eventually};
use kodegen_chat_bridge::channel::webhook::{SIGNATURE_HEADER, sign};
use kodegen_chat_bridge::server::{AppState, router};
use kodegen_chat_bridge::{AgentGateway, Bridge};
use serde_json::json;
use tower::ServiceExt;

const SECRET: &str = "channel-secret";

fn app(backend: &MockBackend, outbound: &RecordingOutbound) -> Router {
    let bridge = Bridge::new(
        AgentGateway::new(backend.clone()),
        outbound.clone(),
        5000,
    );
    router(AppState::new(bridge, SECRET))
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn text_event(user_id: &str, text: &str) -> serde_json::Value {
    json!({
        "type": "message",
        "replyToken": format!("reply-{user_id}"),
        "source": {"type": "user", "userId": user_id},
        "message": {"id": "1", "type": "text", "text": text}
    })
}

#[tokio::test]
async fn test_health() {
    let app = app(&MockBackend::new(), &RecordingOutbound::new());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let backend = MockBackend::new();
    let app = app(&backend, &RecordingOutbound::new());
    let body = json!({"events": [text_event("alice", "hi")]}).to_string();

    let response = app.oneshot(webhook_request(&body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_signature_is_rejected() {
    let backend = MockBackend::new();
    let app = app(&backend, &RecordingOutbound::new());
    let body = json!({"events": [text_event("alice", "hi")]}).to_string();
    let signature = sign(body.as_bytes(), "some-other-secret");

    let response = app
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(backend.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let app = app(&MockBackend::new(), &RecordingOutbound::new());
    let body = "{\"events\": 12";
    let signature = sign(body.as_bytes(), SECRET);

    let response = app
        .oneshot(webhook_request(body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_event_is_dispatched() {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = MockBackend::new();
    let outbound = RecordingOutbound::new();
    let app = app(&backend, &outbound);
    let body = json!({
        "destination": "bot",
        "events": [
            {"type": "follow", "replyToken": "r0", "source": {"type": "user", "userId": "alice"}},
            text_event("alice", "hello bridge"),
            {
                "type": "message",
                "replyToken": "r2",
                "source": {"type": "user", "userId": "alice"},
                "message": {"id": "2", "type": "sticker"}
            }
        ]
    })
    .to_string();
    let signature = sign(body.as_bytes(), SECRET);

    let response = app
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(eventually(|| !outbound.sent().is_empty()).await);
    assert_eq!(
        outbound.sent(),
        vec![Outgoing::Push {
            user_id: "alice".to_string(),
            text: "echo: hello bridge".to_string(),
        }]
    );
    assert_eq!(backend.sent().len(), 1);
}

#[tokio::test]
async fn test_control_command_uses_reply_token() {
    let outbound = RecordingOutbound::new();
    let app = app(&MockBackend::new(), &outbound);
    let body = json!({"events": [text_event("alice", "/help")]}).to_string();
    let signature = sign(body.as_bytes(), SECRET);

    let response = app
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(eventually(|| !outbound.sent().is_empty()).await);
    let sent = outbound.sent();
    assert!(matches!(
        &sent[0],
        Outgoing::Reply { token, .. } if token == "reply-alice"
    ));
}
