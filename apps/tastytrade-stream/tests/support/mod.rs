//! Shared helpers for session integration tests: a mocked venue REST API
//! and raw WebSocket acceptors for scripting server-side frames.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tastytrade_stream::{AuthConfig, TokenStore};

/// Start a mocked venue REST API that issues a 1-hour session token.
pub async fn start_rest_server() -> MockServer {
    let server = MockServer::start().await;
    let expiration = Utc::now() + ChronoDuration::hours(1);

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "session-token": "sess-tok",
            "remember-token": "rem",
            "session-expiration": expiration.to_rfc3339(),
        })))
        .mount(&server)
        .await;

    server
}

/// Mount the quote-token endpoint pointing at the given feed URL.
pub async fn mount_quote_token(server: &MockServer, dxlink_url: &str, level: &str) {
    Mock::given(method("GET"))
        .and(path("/api-quote-tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dxlink-url": dxlink_url,
            "level": level,
            "token": "quote-tok",
        })))
        .mount(server)
        .await;
}

/// Token store wired against the mocked REST API.
pub fn token_store(server: &MockServer) -> Arc<TokenStore> {
    Arc::new(
        TokenStore::new(AuthConfig {
            base_url: server.uri(),
            login: "trader".to_string(),
            password: "hunter2".to_string(),
            intermediary_url: server.uri(),
            refresh_secret: "secret".to_string(),
            account_number: "5WT00000".to_string(),
            brokerage: "tastytrade".to_string(),
        })
        .unwrap(),
    )
}

/// Bind a listener on a random port; returns it with its `ws://` URL.
pub async fn bind_ws() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}"))
}

/// Accept one WebSocket connection.
pub async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Next inbound text frame parsed as JSON; `None` when the peer disconnects.
pub async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<serde_json::Value> {
    use futures_util::StreamExt;
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Send one JSON frame to the client.
pub async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: &serde_json::Value) {
    use futures_util::SinkExt;
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}
