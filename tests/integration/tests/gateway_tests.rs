//! Gateway integration tests
//!
//! Each test starts its own gateway on a local port with an in-memory user
//! directory; no external services are required.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use chat_core::{ConversationId, UserId};
use integration_tests::{
    assert_json, assert_status, fixtures::*, test_config, TestServer, WsClient,
};
use reqwest::StatusCode;
use serde_json::json;
use tokio_tungstenite::tungstenite;

const QUIET: Duration = Duration::from_millis(200);

// ============================================================================
// HTTP surface
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_presence_endpoint() {
    let server = TestServer::start().await.unwrap();
    let alice = unique_user("alice");
    let token = server.token_for("observer").unwrap();

    let response = server
        .get_auth(&format!("/presence/{alice}"), &token)
        .await
        .unwrap();
    let body: PresenceResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body.user_id, alice);
    assert!(!body.online);

    let client = server.connect(&alice).await.unwrap();
    server.wait_online(&alice, true).await.unwrap();

    let response = server
        .get_auth(&format!("/presence/{alice}"), &token)
        .await
        .unwrap();
    let body: PresenceResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(body.online);

    client.close().await.unwrap();
    server.wait_online(&alice, false).await.unwrap();
}

#[tokio::test]
async fn test_presence_endpoint_requires_token() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/presence/anyone").await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.error.code, "MISSING_AUTH");
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_connect_without_token_rejected() {
    let server = TestServer::start().await.unwrap();
    let url = format!("ws://{}/ws", server.addr);

    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        Err(e) => panic!("expected HTTP 401, got {e}"),
        Ok(_) => panic!("connection without a token was accepted"),
    }
}

#[tokio::test]
async fn test_connect_with_bad_token_rejected() {
    let server = TestServer::start().await.unwrap();

    match WsClient::connect(&server.ws_url("garbage")).await {
        Err(e) => match e.downcast_ref::<tungstenite::Error>() {
            Some(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 401);
            }
            other => panic!("expected HTTP 401, got {other:?}"),
        },
        Ok(_) => panic!("connection with a bad token was accepted"),
    }
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let server = TestServer::start().await.unwrap();
    let other = TestServer::start_with_config(
        test_config(&[("JWT_SECRET", "a-completely-different-secret-value")]).unwrap(),
    )
    .await
    .unwrap();
    let token = other.token_for("mallory").unwrap();

    assert!(WsClient::connect(&server.ws_url(&token)).await.is_err());
}

// ============================================================================
// Topic delivery
// ============================================================================

#[tokio::test]
async fn test_message_reaches_each_subscriber_once() {
    let server = TestServer::start().await.unwrap();
    let conv = unique_conversation();

    let mut a = server.connect(&unique_user("a")).await.unwrap();
    let mut b = server.connect(&unique_user("b")).await.unwrap();
    let mut c = server.connect(&unique_user("c")).await.unwrap();

    a.subscribe(&conv).await.unwrap();
    b.subscribe(&conv).await.unwrap();
    // Repeated subscribe must not double delivery
    b.subscribe(&conv).await.unwrap();

    server.state.publisher().message_sent(
        ConversationId::new(conv.clone()),
        UserId::new("author"),
        "hello",
    );

    for client in [&mut a, &mut b] {
        let event = client.next_of_kind("message").await.unwrap();
        assert_eq!(event["conversationId"], conv.as_str());
        assert_eq!(event["content"], "hello");
        assert_eq!(event["senderId"], "author");
        client.assert_quiet(QUIET).await.unwrap();
    }
    c.assert_quiet(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = TestServer::start().await.unwrap();
    let conv = unique_conversation();
    let mut a = server.connect(&unique_user("a")).await.unwrap();
    let mut b = server.connect(&unique_user("b")).await.unwrap();

    a.subscribe(&conv).await.unwrap();
    b.subscribe(&conv).await.unwrap();

    a.send_json(&unsubscribe_frame(&conv)).await.unwrap();
    // Frames are applied in order, so this completes after the unsubscribe
    a.subscribe(&unique_conversation()).await.unwrap();

    b.send_json(&json!({ "type": "message", "conversationId": conv, "content": "still here?" }))
        .await
        .unwrap();

    let event = b.next_of_kind("message").await.unwrap();
    assert_eq!(event["content"], "still here?");
    a.assert_quiet(QUIET).await.unwrap();
}

#[tokio::test]
async fn test_client_message_is_stamped_with_sender() {
    let server = TestServer::start().await.unwrap();
    let conv = unique_conversation();
    let alice = unique_user("alice");
    let mut a = server.connect(&alice).await.unwrap();
    let mut b = server.connect(&unique_user("bob")).await.unwrap();
    a.subscribe(&conv).await.unwrap();
    b.subscribe(&conv).await.unwrap();

    a.send_json(&json!({
        "type": "message",
        "chatId": conv,
        "senderId": "someone-else",
        "content": "hi"
    }))
    .await
    .unwrap();

    let event = b.next_of_kind("message").await.unwrap();
    assert_eq!(event["senderId"], alice.as_str());
    assert_eq!(event["conversationId"], conv.as_str());
    assert!(event["timestamp"].is_string());
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let server = TestServer::start().await.unwrap();
    let conv = unique_conversation();
    let mut a = server.connect(&unique_user("a")).await.unwrap();

    a.send_text("{not json").await.unwrap();
    a.send_json(&json!({ "type": "subscribe" })).await.unwrap();
    a.send_json(&json!({ "type": "message", "content": "no topic" }))
        .await
        .unwrap();

    a.subscribe(&conv).await.unwrap();
}

#[tokio::test]
async fn test_oversized_frame_discarded() {
    let server = TestServer::start_with_config(
        test_config(&[("REALTIME_MAX_FRAME_BYTES", "1024")]).unwrap(),
    )
    .await
    .unwrap();
    let conv = unique_conversation();
    let mut a = server.connect(&unique_user("a")).await.unwrap();
    a.subscribe(&conv).await.unwrap();

    let big = "x".repeat(2048);
    a.send_json(&json!({ "type": "message", "conversationId": conv, "content": big }))
        .await
        .unwrap();
    a.assert_quiet(QUIET).await.unwrap();

    // Still usable afterwards
    a.subscribe(&unique_conversation()).await.unwrap();
}

#[tokio::test]
async fn test_legacy_frame_with_chat_and_group_ids() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect(&unique_user("a")).await.unwrap();

    a.send_json(&json!({ "type": "subscribe", "chatId": "c-1", "groupId": "g-1" }))
        .await
        .unwrap();

    for conv in ["c-1", "g-1"] {
        a.send_json(&typing_frame(conv)).await.unwrap();
        let event = a.next_of_kind("typing").await.unwrap();
        assert_eq!(event["conversationId"], conv);
    }
}

#[tokio::test]
async fn test_queued_envelopes_share_one_frame() {
    let server = TestServer::start().await.unwrap();
    let conv = unique_conversation();
    let mut a = server.connect(&unique_user("a")).await.unwrap();
    a.subscribe(&conv).await.unwrap();

    // Published back to back while the client is not reading
    let publisher = server.state.publisher();
    for i in 0..20 {
        publisher.message_sent(
            ConversationId::new(conv.clone()),
            UserId::new("author"),
            format!("m{i}"),
        );
    }

    let mut contents = Vec::new();
    let mut frames = 0;
    while contents.len() < 20 {
        let text = a.next_text_frame().await.unwrap();
        frames += 1;
        for line in text.split('\n') {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            contents.push(event["content"].as_str().unwrap().to_string());
        }
    }

    let expected: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
    assert_eq!(contents, expected);
    assert!(frames < 20, "expected coalesced writes, got {frames} frames");
}
#[tokio::test]
async fn test_unknown_kind_reaches_everyone() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect(&unique_user("a")).await.unwrap();
    let mut b = server.connect(&unique_user("b")).await.unwrap();
    // Make sure both sessions are registered before publishing
    a.subscribe(&unique_conversation()).await.unwrap();
    b.subscribe(&unique_conversation()).await.unwrap();

    a.send_json(&json!({ "type": "custom_ping", "data": { "n": 1 } }))
        .await
        .unwrap();

    for client in [&mut a, &mut b] {
        let event = client.next_of_kind("custom_ping").await.unwrap();
        assert_eq!(event["data"]["n"], 1);
    }
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_friend_sees_online_and_offline() {
    let server = TestServer::start().await.unwrap();
    let alice = unique_user("alice");
    let bob = unique_user("bob");
    let carol = unique_user("carol");
    server.befriend(&alice, &bob);

    let mut b = server.connect(&bob).await.unwrap();
    let mut c = server.connect(&carol).await.unwrap();
    server.wait_online(&bob, true).await.unwrap();
    server.wait_online(&carol, true).await.unwrap();

    let a = server.connect(&alice).await.unwrap();
    let online = b.next_of_kind("online").await.unwrap();
    assert_eq!(online["data"]["userId"], alice.as_str());
    assert_eq!(online["data"]["online"], true);

    a.close().await.unwrap();
    let offline = b.next_of_kind("offline").await.unwrap();
    assert_eq!(offline["data"]["userId"], alice.as_str());
    assert_eq!(offline["data"]["online"], false);

    c.assert_quiet(QUIET).await.unwrap();
    assert_eq!(
        server.directory.online_flag(&UserId::new(alice.as_str())),
        Some(false)
    );
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_session() {
    let server = TestServer::start().await.unwrap();
    let alice = unique_user("alice");
    let bob = unique_user("bob");
    server.befriend(&alice, &bob);

    let mut b = server.connect(&bob).await.unwrap();
    server.wait_online(&bob, true).await.unwrap();

    let mut first = server.connect(&alice).await.unwrap();
    b.next_of_kind("online").await.unwrap();

    let mut second = server.connect(&alice).await.unwrap();
    assert_eq!(first.expect_close().await.unwrap(), 4014);

    // The replacement announces online again and no offline slips through
    b.next_of_kind("online").await.unwrap();
    b.assert_quiet(QUIET).await.unwrap();
    assert!(server.state.publisher().is_online(&UserId::new(alice.as_str())));

    let conv = unique_conversation();
    second.subscribe(&conv).await.unwrap();
}

// ============================================================================
// Liveness
// ============================================================================

#[tokio::test]
async fn test_silent_client_times_out() {
    let server =
        TestServer::start_with_config(test_config(&[("REALTIME_PONG_WAIT_MS", "300")]).unwrap())
            .await
            .unwrap();
    let alice = unique_user("alice");
    let mut a = server.connect(&alice).await.unwrap();
    server.wait_online(&alice, true).await.unwrap();

    // Not reading means pings go unanswered
    tokio::time::sleep(Duration::from_millis(800)).await;

    server.wait_online(&alice, false).await.unwrap();
    assert_eq!(a.expect_close().await.unwrap(), 4009);
}

#[tokio::test]
async fn test_responsive_client_stays_connected() {
    let server =
        TestServer::start_with_config(test_config(&[("REALTIME_PONG_WAIT_MS", "600")]).unwrap())
            .await
            .unwrap();
    let alice = unique_user("alice");
    let mut a = server.connect(&alice).await.unwrap();
    server.wait_online(&alice, true).await.unwrap();

    // Reading answers each ping, well past several pong windows
    a.assert_quiet(Duration::from_millis(1500)).await.unwrap();

    assert!(server.state.publisher().is_online(&UserId::new(alice.as_str())));
    a.subscribe(&unique_conversation()).await.unwrap();
}
