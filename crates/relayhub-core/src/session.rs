//! Registered sessions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use relayhub_protocols::{Agent, Connection, Frame, Identity, RelayError};

/// Lifecycle of one connection's session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One logged-in user's live connection.
///
/// Immutable once created; a reconnect produces a new `Session` with a new
/// `session_id`. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    session_id: Uuid,
    user_id: String,
    level: i64,
    connected_at: DateTime<Utc>,
    connection: Arc<dyn Connection>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, level: i64, connection: Arc<dyn Connection>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: Uuid::new_v4(),
                user_id: user_id.into(),
                level,
                connected_at: Utc::now(),
                connection,
            }),
        }
    }

    pub fn from_identity(identity: Identity, connection: Arc<dyn Connection>) -> Self {
        Self::new(identity.user_id, identity.level, connection)
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn level(&self) -> i64 {
        self.inner.level
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.inner.connected_at
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    /// Whether `other` is this very session rather than a later login of the
    /// same user.
    pub fn is_same(&self, other: &Session) -> bool {
        self.inner.session_id == other.inner.session_id
    }

    /// Write a frame, giving up after `deadline`.
    pub async fn write_with_deadline(&self, frame: Frame, deadline: Duration) -> Result<(), RelayError> {
        match tokio::time::timeout(deadline, self.inner.connection.write_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::WriteTimeout(deadline)),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("user_id", &self.inner.user_id)
            .field("level", &self.inner.level)
            .field("connected_at", &self.inner.connected_at)
            .field("remote_addr", &self.inner.connection.remote_addr())
            .finish()
    }
}

#[async_trait]
impl Agent for Session {
    fn id(&self) -> &str {
        self.user_id()
    }

    async fn push(&self, frame: Frame) -> Result<(), RelayError> {
        self.inner.connection.write_frame(frame).await
    }
}
