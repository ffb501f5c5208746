//! Tests for the command router
//!
//! Control commands, prompt forwarding, segmentation of responses and error
//! acknowledgement through a recording outbound client

mod common;

use std::time::Duration;

use common::{MockBackend, Outgoing, RecordingOutbound, Step, eventually};
use kodegen_chat_bridge::{AgentGateway, Bridge, MAX_ERROR_DISPLAY_CHARS, ReplyContext};

fn bridge(
    backend: &MockBackend,
    outbound: &RecordingOutbound,
    chunk_limit: usize,
) -> Bridge<MockBackend, RecordingOutbound> {
    Bridge::new(
        AgentGateway::new(backend.clone()),
        outbound.clone(),
        chunk_limit,
    )
}

fn token(n: u32) -> ReplyContext {
    ReplyContext::new(format!("token-{n}"))
}

#[tokio::test]
async fn test_prompt_response_is_pushed() {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = MockBackend::scripted([Step::Reply("Hello from the agent", 0.01)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge
        .on_text_message("alice", "  hi agent  ", token(1))
        .await
        .unwrap();

    assert_eq!(backend.sent()[0].prompt, "hi agent");
    assert_eq!(
        outbound.sent(),
        vec![Outgoing::Push {
            user_id: "alice".to_string(),
            text: "Hello from the agent".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_long_response_is_segmented() {
    let backend = MockBackend::scripted([Step::Reply("aaaaaaaaaaaa", 0.0)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5);

    bridge.on_text_message("alice", "spam", token(1)).await.unwrap();

    assert_eq!(outbound.pushes(), vec!["aaaaa", "aaaaa", "aa"]);
}

#[tokio::test]
async fn test_failed_chunk_is_skipped() {
    let backend = MockBackend::scripted([Step::Reply("first\nsecond\nthird", 0.0)]);
    let outbound = RecordingOutbound::new().rejecting_push_containing("second");
    let bridge = bridge(&backend, &outbound, 7);

    bridge.on_text_message("alice", "list", token(1)).await.unwrap();

    assert_eq!(outbound.pushes(), vec!["first", "third"]);
}

#[tokio::test]
async fn test_empty_response_gets_placeholder() {
    let backend = MockBackend::scripted([Step::Reply("   ", 0.0)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "hello", token(1)).await.unwrap();

    let pushes = outbound.pushes();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].contains("empty response"));
}

#[tokio::test]
async fn test_prompts_are_answered_in_order() {
    let backend = MockBackend::scripted([
        Step::Delayed(Duration::from_millis(40), "slow first"),
        Step::Delayed(Duration::from_millis(1), "quick second"),
    ]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    let first = bridge.on_text_message("alice", "one", token(1));
    let second = bridge.on_text_message("alice", "two", token(2));
    let _ = tokio::join!(first, second);

    assert_eq!(outbound.pushes(), vec!["slow first", "quick second"]);
}

#[tokio::test]
async fn test_backend_error_is_replied() {
    let _ = env_logger::builder().is_test(true).try_init();

    let detail: &'static str = Box::leak("x".repeat(500).into_boxed_str());
    let backend = MockBackend::scripted([Step::Fail(detail)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "hello", token(7)).await.unwrap();

    let sent = outbound.sent();
    assert_eq!(sent.len(), 1);
    let Outgoing::Reply { token, messages } = &sent[0] else {
        panic!("expected a reply, got {sent:?}");
    };
    assert_eq!(token, "token-7");
    assert!(messages[0].starts_with("Error: "));
    assert!(messages[0].chars().count() <= MAX_ERROR_DISPLAY_CHARS);
}

#[tokio::test]
async fn test_error_falls_back_to_push_when_reply_fails() {
    let backend = MockBackend::scripted([Step::Fail("backend down")]);
    let outbound = RecordingOutbound::new().rejecting_replies();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "hello", token(1)).await.unwrap();

    let pushes = outbound.pushes();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].contains("backend down"));
}

#[tokio::test]
async fn test_queue_survives_failed_prompt() {
    let backend = MockBackend::scripted([Step::Fail("boom"), Step::Reply("recovered", 0.0)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    let first = bridge.on_text_message("alice", "one", token(1));
    let second = bridge.on_text_message("alice", "two", token(2));
    let _ = tokio::join!(first, second);

    assert_eq!(outbound.replies().len(), 1);
    assert_eq!(outbound.pushes(), vec!["recovered"]);
}

#[tokio::test]
async fn test_abort_cancels_without_waiting_in_queue() {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = MockBackend::scripted([Step::Hang, Step::Reply("after abort", 0.0)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    let running = bridge.on_text_message("alice", "long job", token(1));
    assert!(eventually(|| bridge.gateway().is_busy("alice")).await);

    let aborted = tokio::time::timeout(
        Duration::from_secs(1),
        bridge.on_text_message("alice", "/ABORT", token(2)),
    )
    .await;
    assert!(aborted.is_ok(), "abort waited behind the running prompt");
    running.await.unwrap();

    assert_eq!(outbound.replies(), vec!["Cancelled the running request."]);
    assert!(outbound.pushes().is_empty());

    bridge.on_text_message("alice", "again", token(3)).await.unwrap();
    assert_eq!(outbound.pushes(), vec!["after abort"]);
}

#[tokio::test]
async fn test_abort_with_nothing_running() {
    let backend = MockBackend::new();
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "/cancel", token(1)).await.unwrap();

    assert_eq!(outbound.replies(), vec!["Nothing to cancel."]);
}

#[tokio::test]
async fn test_cost_command() {
    let backend = MockBackend::scripted([Step::Reply("a", 0.01), Step::Reply("b", 0.02)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "/cost", token(1)).await.unwrap();
    bridge.on_text_message("alice", "one", token(2)).await.unwrap();
    bridge.on_text_message("alice", "two", token(3)).await.unwrap();
    bridge.on_text_message("alice", "/Cost", token(4)).await.unwrap();

    assert_eq!(
        outbound.replies(),
        vec!["No active session.", "Total cost: $0.0300"]
    );
}

#[tokio::test]
async fn test_reset_command() {
    let backend = MockBackend::new();
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "hello", token(1)).await.unwrap();
    bridge.on_text_message("alice", "/reset", token(2)).await.unwrap();
    bridge.on_text_message("alice", "/new", token(3)).await.unwrap();

    let replies = outbound.replies();
    assert!(replies[0].starts_with("Session reset."));
    assert!(replies[1].starts_with("No active session."));
    assert!(bridge.gateway().store().get("alice").is_none());

    bridge.on_text_message("alice", "hello again", token(4)).await.unwrap();
    assert_eq!(backend.creates(), 2);
}

#[tokio::test]
async fn test_session_command() {
    let backend = MockBackend::scripted([Step::Reply("a", 0.5)]);
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "/session", token(1)).await.unwrap();
    bridge.on_text_message("alice", "hello", token(2)).await.unwrap();
    bridge.on_text_message("alice", "/status", token(3)).await.unwrap();

    let replies = outbound.replies();
    assert_eq!(replies[0], "No active session.");
    assert!(replies[1].contains("Session: s1"));
    assert!(replies[1].contains("Prompts: 1"));
    assert!(replies[1].contains("Cost: $0.5000"));
    assert!(replies[1].contains("Backend: idle"));
}

#[tokio::test]
async fn test_help_and_blank_messages() {
    let backend = MockBackend::new();
    let outbound = RecordingOutbound::new();
    let bridge = bridge(&backend, &outbound, 5000);

    bridge.on_text_message("alice", "   ", token(1)).await.unwrap();
    assert!(outbound.sent().is_empty());

    bridge.on_text_message("alice", "/help", token(2)).await.unwrap();
    let replies = outbound.replies();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("/reset"));
    assert!(replies[0].contains("/abort"));
    assert!(backend.sent().is_empty());
}
