//! Account Stream Integration Tests
//!
//! Exercises the single-step connect handshake, its correlation, denial and
//! timeout semantics, and the credential-carrying heartbeat against an
//! in-process WebSocket server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::time::timeout;

use tastytrade_stream::{
    AccountStreamConfig, AccountStreamSession, SessionError, SessionEvent, SessionState,
};

mod support;

fn config(url: &str) -> AccountStreamConfig {
    AccountStreamConfig {
        url: url.to_string(),
        account_number: "5WT00000".to_string(),
        connect_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn connect_sends_scoped_frame_and_completes_on_ok() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    let server = tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let connect = support::next_json(&mut ws).await.unwrap();

        assert_eq!(connect["action"], "connect");
        assert_eq!(connect["value"], serde_json::json!(["5WT00000"]));
        assert_eq!(connect["auth-token"], "sess-tok");
        let request_id = connect["request-id"].as_u64().unwrap();

        support::send_json(
            &mut ws,
            &serde_json::json!({
                "status": "ok",
                "action": "connect",
                "web-socket-session-id": "ws-1",
                "request-id": request_id,
            }),
        )
        .await;
        ws
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    let (_listener_id, mut events) = session.subscribe_events();

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(
        timeout(Duration::from_secs(1), events.recv()).await.unwrap(),
        Some(SessionEvent::Opened)
    );

    session.close();
    server.await.unwrap();
}

#[tokio::test]
async fn uncorrelated_responses_are_skipped() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    let server = tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let connect = support::next_json(&mut ws).await.unwrap();
        let request_id = connect["request-id"].as_u64().unwrap();

        // A response for someone else's request must not complete the wait.
        support::send_json(
            &mut ws,
            &serde_json::json!({"status": "error", "request-id": request_id + 1000}),
        )
        .await;
        support::send_json(
            &mut ws,
            &serde_json::json!({"status": "ok", "action": "connect", "request-id": request_id}),
        )
        .await;
        ws
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    session.connect().await.unwrap();
    assert!(session.is_ready());

    session.close();
    server.await.unwrap();
}

#[tokio::test]
async fn denied_status_fails_with_server_message() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let connect = support::next_json(&mut ws).await.unwrap();
        let request_id = connect["request-id"].as_u64().unwrap();

        support::send_json(
            &mut ws,
            &serde_json::json!({
                "status": "error",
                "action": "connect",
                "message": "account not streamable",
                "request-id": request_id,
            }),
        )
        .await;
        // Hold the socket open until the client gives up on it.
        let _ = support::next_json(&mut ws).await;
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    let error = session.connect().await.unwrap_err();

    match error {
        SessionError::HandshakeDenied { status, message } => {
            assert_eq!(status, "error");
            assert_eq!(message, "account not streamable");
        }
        other => panic!("expected HandshakeDenied, got {other}"),
    }
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn silent_server_times_out_and_socket_is_closed() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    let server = tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let _connect = support::next_json(&mut ws).await;
        // Never respond; the next read observes the client closing.
        support::next_json(&mut ws).await
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    let error = session.connect().await.unwrap_err();

    assert!(matches!(error, SessionError::HandshakeTimeout { .. }));
    assert_eq!(session.state(), SessionState::Closed);

    // The failed attempt closed the socket rather than leaving it half-open.
    let server_view = timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
    assert!(server_view.is_none());
}

#[tokio::test]
async fn heartbeats_carry_credential_and_fresh_request_ids() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    let (beats_tx, mut beats_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let connect = support::next_json(&mut ws).await.unwrap();
        let request_id = connect["request-id"].as_u64().unwrap();
        support::send_json(
            &mut ws,
            &serde_json::json!({"status": "ok", "action": "connect", "request-id": request_id}),
        )
        .await;

        while let Some(frame) = support::next_json(&mut ws).await {
            if frame["action"] == "heartbeat" {
                beats_tx.send(frame).unwrap();
            }
        }
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    session.connect().await.unwrap();

    let first = timeout(Duration::from_secs(2), beats_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = timeout(Duration::from_secs(2), beats_rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first["auth-token"], "sess-tok");
    assert_eq!(second["auth-token"], "sess-tok");
    let first_id = first["request-id"].as_u64().unwrap();
    let second_id = second["request-id"].as_u64().unwrap();
    assert!(second_id > first_id, "request ids must be fresh per beat");

    // Heartbeats stop within a tick after close.
    session.close();
    while beats_rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        beats_rx.try_recv().is_err(),
        "no heartbeat may be sent after close"
    );
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let rest = support::start_rest_server().await;
    let (listener, url) = support::bind_ws().await;

    tokio::spawn(async move {
        let mut ws = support::accept_ws(&listener).await;
        let connect = support::next_json(&mut ws).await.unwrap();
        let request_id = connect["request-id"].as_u64().unwrap();
        support::send_json(
            &mut ws,
            &serde_json::json!({"status": "ok", "action": "connect", "request-id": request_id}),
        )
        .await;
        let _ = support::next_json(&mut ws).await;
    });

    let session =
        AccountStreamSession::account_stream(config(&url), support::token_store(&rest));
    session.connect().await.unwrap();

    assert!(matches!(
        session.connect().await.unwrap_err(),
        SessionError::AlreadyConnected
    ));

    session.close();
}
