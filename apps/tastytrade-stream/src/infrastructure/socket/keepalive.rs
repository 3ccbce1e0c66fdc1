//! Keep-Alive Timer
//!
//! Periodic keep-alive sender owned by one connection. A fresh timer task is
//! spawned per connection and stopped through that connection's cancellation
//! token; ticks while the session is not ready are no-ops, so a tick racing a
//! close never writes to a dead socket.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{FrameSink, SessionProtocol, SessionState};

/// Periodic keep-alive sender for one connection.
pub(super) struct KeepaliveTimer<P: SessionProtocol> {
    protocol: Arc<P>,
    sink: FrameSink,
    state: Arc<parking_lot::RwLock<SessionState>>,
    cancel: CancellationToken,
}

impl<P: SessionProtocol> KeepaliveTimer<P> {
    pub(super) fn new(
        protocol: Arc<P>,
        sink: FrameSink,
        state: Arc<parking_lot::RwLock<SessionState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            protocol,
            sink,
            state,
            cancel,
        }
    }

    /// Run until cancelled. Never propagates an error across the timer
    /// boundary; failures to produce or enqueue a frame are logged.
    pub(super) async fn run(self) {
        let period = self.protocol.keepalive_interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!(session = self.protocol.name(), "keep-alive timer stopped");
                    break;
                }
                _ = interval.tick() => {
                    if *self.state.read() != SessionState::Ready {
                        continue;
                    }
                    match self.protocol.keepalive_frame().await {
                        Ok(frame) => {
                            if self.sink.send(frame).is_err() {
                                tracing::debug!(
                                    session = self.protocol.name(),
                                    "keep-alive outbox closed, stopping timer"
                                );
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                session = self.protocol.name(),
                                error = %e,
                                "keep-alive frame unavailable"
                            );
                        }
                    }
                }
            }
        }
    }
}
