//! Socket Session Base
//!
//! Shared lifecycle for the two venue socket sessions (account stream and
//! dxLink feed). A session owns one physical WebSocket connection, a
//! keep-alive timer, and an event listener registry; the protocol-specific
//! pieces (endpoint resolution, handshake, keep-alive payload, inbound frame
//! handling) are supplied through [`SessionProtocol`].
//!
//! # Lifecycle
//!
//! ```text
//! Closed --connect()--> Handshaking --handshake ok--> Ready --close()/error--> Closed
//! ```
//!
//! `connect()` performs the full ordered handshake before any read loop or
//! timer exists, so no subscription or keep-alive traffic can precede the
//! terminal handshake confirmation. Every connection gets a fresh
//! cancellation token and a fresh keep-alive task; nothing is reused across
//! connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::tastytrade::auth::AuthError;

mod keepalive;

use keepalive::KeepaliveTimer;

/// The client-side WebSocket stream type used by all sessions.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by socket sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Socket-level I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// No correlated response arrived within a handshake step's bound.
    #[error("handshake step '{step}' timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Name of the handshake step that timed out.
        step: &'static str,
        /// The configured per-step bound.
        timeout: Duration,
    },

    /// The server explicitly rejected the handshake.
    #[error("handshake denied (status '{status}'): {message}")]
    HandshakeDenied {
        /// Status reported by the server.
        status: String,
        /// Server-supplied message, if any.
        message: String,
    },

    /// The server sent an error-kind frame.
    #[error("protocol error '{code}': {message}")]
    Protocol {
        /// Error code reported by the server.
        code: String,
        /// Server-supplied message.
        message: String,
    },

    /// A frame kind the current handshake step does not recognize.
    #[error("unsupported message kind: {0}")]
    UnsupportedMessage(String),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Operation requires an open session.
    #[error("session is not connected")]
    NotConnected,

    /// `connect()` called while a connection already exists.
    #[error("session is already connected")]
    AlreadyConnected,

    /// The session was closed while an operation was in flight.
    #[error("session closed while connecting")]
    Cancelled,

    /// Credential acquisition failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Outbound frame could not be serialized.
    #[error("frame serialization failed: {0}")]
    Frame(#[from] serde_json::Error),
}

// =============================================================================
// State & Events
// =============================================================================

/// Connection state of a socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Closed,
    /// Socket open, handshake in progress.
    Handshaking,
    /// Handshake complete; session usable.
    Ready,
}

/// Notifications dispatched to registered session listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake completed; the session is ready.
    Opened,
    /// A raw inbound text frame.
    Frame(String),
    /// The session transitioned to closed.
    Closed,
    /// A transport or protocol error was observed on the live connection.
    Error(String),
}

/// Identifier handed out by [`Listeners::subscribe`].
pub type ListenerId = u64;

/// Explicit listener registry for session events.
///
/// Listeners subscribe for an id + receiver pair and must unsubscribe on
/// teardown; dispatch drops listeners whose receiver has gone away.
#[derive(Debug, Default)]
pub struct Listeners {
    entries: parking_lot::Mutex<Vec<(ListenerId, mpsc::UnboundedSender<SessionEvent>)>>,
    next_id: AtomicU64,
}

impl Listeners {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns its id and the event receiver.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<SessionEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries.lock().push((id, tx));
        (id, rx)
    }

    /// Remove a listener by id.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.entries.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Dispatch an event to every registered listener.
    pub fn dispatch(&self, event: &SessionEvent) {
        self.entries
            .lock()
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// Handle for enqueueing outbound frames onto a live connection.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<String>,
}

impl FrameSink {
    /// Enqueue one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the connection's write
    /// loop has exited.
    pub fn send(&self, frame: String) -> Result<(), SessionError> {
        self.tx.send(frame).map_err(|_| SessionError::NotConnected)
    }
}

// =============================================================================
// Handshake Transport
// =============================================================================

/// Read/write access to the socket during the handshake phase.
///
/// The handshake runs on the caller's task against the unsplit stream; each
/// read is bounded by the protocol's per-step timeout and aborts early if the
/// session is closed mid-handshake.
pub struct Handshake<'a> {
    stream: &'a mut WsStream,
    cancel: &'a CancellationToken,
    step_timeout: Duration,
}

impl Handshake<'_> {
    /// Send one handshake frame.
    pub async fn send(&mut self, frame: String) -> Result<(), SessionError> {
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(SessionError::from)
    }

    /// Await the next text frame for the named handshake step.
    ///
    /// Control frames are answered/ignored transparently. Fails with
    /// [`SessionError::HandshakeTimeout`] when no text frame arrives within
    /// the step bound, and with [`SessionError::Cancelled`] when the session
    /// is closed while waiting.
    pub async fn expect_text(&mut self, step: &'static str) -> Result<String, SessionError> {
        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                next = tokio::time::timeout(self.step_timeout, self.stream.next()) => next,
            };

            match next {
                Err(_) => {
                    return Err(SessionError::HandshakeTimeout {
                        step,
                        timeout: self.step_timeout,
                    });
                }
                Ok(None) => return Err(SessionError::ConnectionClosed),
                Ok(Some(Ok(Message::Text(text)))) => return Ok(text.to_string()),
                Ok(Some(Ok(Message::Ping(payload)))) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Ok(Some(Ok(Message::Close(_)))) => return Err(SessionError::ConnectionClosed),
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => return Err(e.into()),
            }
        }
    }
}

// =============================================================================
// Session Protocol
// =============================================================================

/// Protocol-specific behavior plugged into [`SocketSession`].
#[async_trait]
pub trait SessionProtocol: Send + Sync + 'static {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Resolve the socket endpoint for this connection attempt.
    async fn endpoint(&self) -> Result<String, SessionError>;

    /// Per-step bound for handshake waits.
    fn handshake_timeout(&self) -> Duration;

    /// Drive the ordered handshake to its terminal confirmation.
    async fn handshake(&self, handshake: &mut Handshake<'_>) -> Result<(), SessionError>;

    /// Interval between keep-alive frames.
    fn keepalive_interval(&self) -> Duration;

    /// Produce the next keep-alive payload.
    async fn keepalive_frame(&self) -> Result<String, SessionError>;

    /// Runs once per connection, after the terminal handshake confirmation.
    async fn on_ready(&self, outbox: &FrameSink) -> Result<(), SessionError> {
        let _ = outbox;
        Ok(())
    }

    /// Inbound text frame observed while the session is ready.
    fn on_frame(&self, text: &str) {
        let _ = text;
    }
}

// =============================================================================
// Socket Session
// =============================================================================

/// Per-connection handle: the outbox plus the token that tears it down.
///
/// Registered before the handshake starts (with no outbox yet) so that
/// `close()` can cancel an in-progress handshake wait.
#[derive(Debug)]
struct ConnectionHandle {
    outbox: Option<FrameSink>,
    cancel: CancellationToken,
}

/// A socket session: one connection, one keep-alive timer, one listener set.
pub struct SocketSession<P: SessionProtocol> {
    protocol: Arc<P>,
    state: Arc<parking_lot::RwLock<SessionState>>,
    listeners: Arc<Listeners>,
    connection: parking_lot::Mutex<Option<ConnectionHandle>>,
}

impl<P: SessionProtocol> SocketSession<P> {
    /// Create a session in the `Closed` state. Performs no I/O.
    pub fn new(protocol: P) -> Self {
        Self {
            protocol: Arc::new(protocol),
            state: Arc::new(parking_lot::RwLock::new(SessionState::Closed)),
            listeners: Arc::new(Listeners::new()),
            connection: parking_lot::Mutex::new(None),
        }
    }

    /// The protocol driving this session.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether the session has completed its handshake.
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Register an event listener.
    pub fn subscribe_events(&self) -> (ListenerId, mpsc::UnboundedReceiver<SessionEvent>) {
        self.listeners.subscribe()
    }

    /// Remove a previously registered event listener.
    pub fn unsubscribe_events(&self, id: ListenerId) {
        self.listeners.unsubscribe(id);
    }

    /// Connect and drive the handshake to completion.
    ///
    /// On success the session is `Ready`, the read/write loop and a fresh
    /// keep-alive timer are running, and the protocol's `on_ready` hook has
    /// run. On any failure the socket is closed before returning; a failed
    /// attempt never leaves a half-open connection.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyConnected`] if the session is not closed, and
    /// any handshake, credential, or transport error from the attempt.
    pub async fn connect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if *state != SessionState::Closed {
                return Err(SessionError::AlreadyConnected);
            }
            *state = SessionState::Handshaking;
        }

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    async fn connect_inner(&self) -> Result<(), SessionError> {
        let url = self.protocol.endpoint().await?;
        tracing::info!(session = self.protocol.name(), url = %url, "connecting");

        // Register the cancellation token before any socket work so close()
        // can unblock the handshake wait. A close() that raced the endpoint
        // resolution has already moved the state back to Closed.
        let cancel = CancellationToken::new();
        {
            if *self.state.read() != SessionState::Handshaking {
                return Err(SessionError::Cancelled);
            }
            *self.connection.lock() = Some(ConnectionHandle {
                outbox: None,
                cancel: cancel.clone(),
            });
        }

        let (mut stream, _response) = connect_async(url.as_str()).await?;

        {
            let mut handshake = Handshake {
                stream: &mut stream,
                cancel: &cancel,
                step_timeout: self.protocol.handshake_timeout(),
            };
            if let Err(e) = self.protocol.handshake(&mut handshake).await {
                let _ = stream.close(None).await;
                return Err(e);
            }
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let outbox = FrameSink { tx: out_tx };
        let (write, read) = stream.split();

        {
            let mut connection = self.connection.lock();
            match connection.as_mut() {
                Some(handle) => handle.outbox = Some(outbox.clone()),
                // close() won the race and took the handle.
                None => return Err(SessionError::Cancelled),
            }
        }

        tokio::spawn(run_loop(
            write,
            read,
            out_rx,
            cancel.clone(),
            Arc::clone(&self.protocol),
            Arc::clone(&self.state),
            Arc::clone(&self.listeners),
        ));

        let timer = KeepaliveTimer::new(
            Arc::clone(&self.protocol),
            outbox.clone(),
            Arc::clone(&self.state),
            cancel.clone(),
        );
        tokio::spawn(timer.run());

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        *self.state.write() = SessionState::Ready;
        self.listeners.dispatch(&SessionEvent::Opened);
        tracing::info!(session = self.protocol.name(), "session ready");

        self.protocol.on_ready(&outbox).await
    }

    /// Enqueue one outbound text frame.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] when no live connection exists.
    pub fn send(&self, frame: String) -> Result<(), SessionError> {
        let connection = self.connection.lock();
        match connection.as_ref().and_then(|handle| handle.outbox.as_ref()) {
            Some(outbox) => outbox.send(frame),
            None => Err(SessionError::NotConnected),
        }
    }

    /// Close the session.
    ///
    /// Synchronously cancels the connection's keep-alive timer and read loop
    /// and unblocks any in-progress handshake wait with a failure. Idempotent.
    pub fn close(&self) {
        tracing::debug!(session = self.protocol.name(), "closing session");
        self.teardown();
    }

    fn teardown(&self) {
        if let Some(handle) = self.connection.lock().take() {
            handle.cancel.cancel();
        }
        let closed = {
            let mut state = self.state.write();
            if *state == SessionState::Closed {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        };
        if closed {
            self.listeners.dispatch(&SessionEvent::Closed);
        }
    }
}

impl<P: SessionProtocol> Drop for SocketSession<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.connection.lock().take() {
            handle.cancel.cancel();
        }
    }
}

// =============================================================================
// Read/Write Loop
// =============================================================================

/// Drains the outbox and the socket until cancellation or a terminal error.
async fn run_loop<P: SessionProtocol>(
    mut write: SplitSink<WsStream, Message>,
    mut read: SplitStream<WsStream>,
    mut outbox: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    protocol: Arc<P>,
    state: Arc<parking_lot::RwLock<SessionState>>,
    listeners: Arc<Listeners>,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outbox.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            // Send failures while closing are best-effort.
                            if !cancel.is_cancelled() {
                                tracing::warn!(
                                    session = protocol.name(),
                                    error = %e,
                                    "outbound send failed"
                                );
                                listeners.dispatch(&SessionEvent::Error(e.to_string()));
                            }
                            break;
                        }
                    }
                    None => break,
                }
            }
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        protocol.on_frame(&text);
                        listeners.dispatch(&SessionEvent::Frame(text.to_string()));
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(session = protocol.name(), "server closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(session = protocol.name(), error = %e, "socket error");
                        listeners.dispatch(&SessionEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    // Stop the keep-alive timer before the close is observable.
    cancel.cancel();
    let closed = {
        let mut state = state.write();
        if *state == SessionState::Closed {
            false
        } else {
            *state = SessionState::Closed;
            true
        }
    };
    if closed {
        listeners.dispatch(&SessionEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_dispatch_to_all_subscribers() {
        let listeners = Listeners::new();
        let (_id_a, mut rx_a) = listeners.subscribe();
        let (_id_b, mut rx_b) = listeners.subscribe();

        listeners.dispatch(&SessionEvent::Opened);

        assert_eq!(rx_a.try_recv().ok(), Some(SessionEvent::Opened));
        assert_eq!(rx_b.try_recv().ok(), Some(SessionEvent::Opened));
    }

    #[test]
    fn listeners_unsubscribe_removes_entry() {
        let listeners = Listeners::new();
        let (id, mut rx) = listeners.subscribe();
        assert_eq!(listeners.len(), 1);

        listeners.unsubscribe(id);
        assert!(listeners.is_empty());

        listeners.dispatch(&SessionEvent::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listeners_drop_dead_receivers_on_dispatch() {
        let listeners = Listeners::new();
        let (_id, rx) = listeners.subscribe();
        drop(rx);

        listeners.dispatch(&SessionEvent::Opened);
        assert!(listeners.is_empty());
    }

    #[test]
    fn frame_sink_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = FrameSink { tx };
        drop(rx);

        assert!(matches!(
            sink.send("frame".to_string()),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn session_state_default_is_closed() {
        assert_eq!(SessionState::default(), SessionState::Closed);
    }
}
