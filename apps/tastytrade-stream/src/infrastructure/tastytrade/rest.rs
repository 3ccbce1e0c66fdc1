//! Venue REST Client
//!
//! Request/response client for the venue's REST API. Every outbound call
//! carries the current credential from the shared [`TokenStore`], with the
//! authorization scheme implied by the credential kind. Failures always
//! carry the failing request's method and path.

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::auth::{AuthError, CredentialKind, TokenStore};

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by [`RequestClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to construct http client: {0}")]
    Init(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{method} {path} failed with status {status}: {body}")]
    Http {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Raw error body.
        body: String,
    },

    /// Network-level failure before a response was received.
    #[error("{method} {path} transport error: {source}")]
    Transport {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded into the expected type.
    #[error("{method} {path} returned an undecodable body: {source}")]
    Decode {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Credential acquisition failed before the request was sent.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

// =============================================================================
// Request Client
// =============================================================================

/// Authenticated request/response client for the venue REST API.
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
    kind: CredentialKind,
}

impl RequestClient {
    /// Create a client that authenticates with the given credential kind.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Init`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        kind: CredentialKind,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(ClientError::Init)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            store,
            kind,
        })
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path, None::<&()>).await
    }

    /// `POST` a JSON body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// `DELETE` a resource, discarding any response body.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self.send(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// Send one request with the current credential attached.
    ///
    /// Empty 2xx bodies (e.g. HTTP 204) decode as JSON `null`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let credential = self.store.credential(self.kind).await?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(AUTHORIZATION, credential.authorization_value());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ClientError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ClientError::Http {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let payload = if text.is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(payload).map_err(|source| ClientError::Decode {
            method,
            path: path.to_string(),
            source,
        })
    }

    /// Best-effort session termination.
    ///
    /// Issues `DELETE /sessions` and invalidates the cached session
    /// credential. A failing logout is logged, never surfaced.
    pub async fn shutdown(&self) {
        if let Err(e) = self.delete("/sessions").await {
            tracing::warn!(error = %e, "session logout failed");
        }
        self.store.invalidate_session().await;
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::infrastructure::tastytrade::auth::AuthConfig;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        message: String,
    }

    async fn store_with_session(server: &MockServer) -> Arc<TokenStore> {
        let expiration = Utc::now() + ChronoDuration::hours(1);
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "session-token": "sess-tok",
                "remember-token": "rem",
                "session-expiration": expiration.to_rfc3339(),
            })))
            .mount(server)
            .await;

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

    #[tokio::test]
    async fn get_injects_session_authorization() {
        let server = MockServer::start().await;
        let store = store_with_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/customers/me"))
            .and(header("authorization", "sess-tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "hello"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = RequestClient::new(server.uri(), store, CredentialKind::Session).unwrap();
        let greeting: Greeting = client.get("/customers/me").await.unwrap();
        assert_eq!(greeting.message, "hello");
    }

    #[tokio::test]
    async fn non_success_carries_method_path_and_body() {
        let server = MockServer::start().await;
        let store = store_with_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/accounts/unknown"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such account"))
            .mount(&server)
            .await;

        let client = RequestClient::new(server.uri(), store, CredentialKind::Session).unwrap();
        let error = client.get::<Greeting>("/accounts/unknown").await.unwrap_err();

        match error {
            ClientError::Http {
                method,
                path,
                status,
                body,
            } => {
                assert_eq!(method, Method::GET);
                assert_eq!(path, "/accounts/unknown");
                assert_eq!(status, 404);
                assert_eq!(body, "no such account");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_accepts_empty_204_body() {
        let server = MockServer::start().await;
        let store = store_with_session(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = RequestClient::new(server.uri(), store, CredentialKind::Session).unwrap();
        client.delete("/sessions").await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_swallows_logout_failure() {
        let server = MockServer::start().await;
        let store = store_with_session(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            RequestClient::new(server.uri(), Arc::clone(&store), CredentialKind::Session).unwrap();
        // Must not panic or propagate.
        client.shutdown().await;
    }
}
