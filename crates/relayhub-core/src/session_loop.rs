//! Per-connection read loop.
//!
//! Reads frames under a rolling idle deadline, answers transport pings,
//! hands data frames to the [`Dispatcher`] and tears the session down when
//! the peer goes away, the deadline passes, or the connection is closed from
//! our side (displacement or shutdown).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use relayhub_protocols::{Frame, OpCode, RelayError, StateListener};

use crate::dispatcher::Dispatcher;
use crate::session::{Session, SessionState};

#[cfg(test)]
#[path = "session_loop_tests.rs"]
mod tests;

/// Why a session loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame.
    CloseReceived,
    /// The frame stream ended without a close frame.
    StreamEnded,
    /// Nothing was read within the idle deadline.
    IdleTimeout(Duration),
    ReadError(String),
    /// The connection was closed by the server.
    ClosedLocally,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloseReceived => write!(f, "close frame received"),
            Self::StreamEnded => write!(f, "stream ended"),
            Self::IdleTimeout(d) => write!(f, "idle for {:?}", d),
            Self::ReadError(e) => write!(f, "read failed: {}", e),
            Self::ClosedLocally => write!(f, "closed by server"),
        }
    }
}

pub struct SessionLoop<S> {
    session: Session,
    frames: S,
    dispatcher: Arc<Dispatcher>,
    listener: Arc<dyn StateListener>,
    read_timeout: Duration,
    state: SessionState,
}

impl<S> SessionLoop<S>
where
    S: Stream<Item = Result<Frame, RelayError>> + Unpin + Send,
{
    pub fn new(
        session: Session,
        frames: S,
        dispatcher: Arc<Dispatcher>,
        listener: Arc<dyn StateListener>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            session,
            frames,
            dispatcher,
            listener,
            read_timeout,
            state: SessionState::Connecting,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until it ends. The session is deregistered and its
    /// connection closed before this returns.
    pub async fn run(&mut self) -> CloseReason {
        self.state = SessionState::Active;
        let connection = self.session.connection().clone();

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = connection.closed() => break CloseReason::ClosedLocally,
                next = tokio::time::timeout(self.read_timeout, self.frames.next()) => next,
            };

            match next {
                Err(_) => break CloseReason::IdleTimeout(self.read_timeout),
                Ok(None) => break CloseReason::StreamEnded,
                Ok(Some(Err(e))) => break CloseReason::ReadError(e.to_string()),
                Ok(Some(Ok(frame))) => {
                    if let Some(reason) = handle_frame(&self.session, &self.dispatcher, frame) {
                        break reason;
                    }
                }
            }
        };

        self.teardown(&reason);
        reason
    }

    fn teardown(&mut self, reason: &CloseReason) {
        self.state = SessionState::Closing;
        self.listener
            .disconnect(self.session.user_id(), self.session.session_id());
        self.session.connection().close();
        self.state = SessionState::Closed;

        info!(
            user = %self.session.user_id(),
            session_id = %self.session.session_id(),
            reason = %reason,
            "Session closed"
        );
    }
}

fn handle_frame(session: &Session, dispatcher: &Arc<Dispatcher>, frame: Frame) -> Option<CloseReason> {
    match frame.opcode() {
        OpCode::Ping => {
            // The pong gets its own task so a slow writer never stalls reads.
            let pong = Frame::pong(frame.into_payload());
            let session = session.clone();
            let write_timeout = dispatcher.write_timeout();
            tokio::spawn(async move {
                if let Err(e) = session.write_with_deadline(pong, write_timeout).await {
                    warn!(user = %session.user_id(), error = %e, "Pong write failed");
                }
            });
            None
        }
        OpCode::Close => Some(CloseReason::CloseReceived),
        OpCode::Text | OpCode::Binary => {
            dispatcher.dispatch(session, frame);
            None
        }
        OpCode::Pong | OpCode::Continuation => {
            debug!(user = %session.user_id(), opcode = %frame.opcode(), "Ignoring frame");
            None
        }
    }
}
