//! Connection core errors.

use std::time::Duration;

use thiserror::Error;

use super::ProtocolError;

/// Errors raised while accepting, reading from or writing to a session.
///
/// Every variant except [`RelayError::StartupFailure`] is contained within a
/// single session; none of them should take the process down.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Handshake failed: {0}")]
    HandshakeFailure(String),

    #[error("Missing required 'user' parameter")]
    MissingIdentity,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Read failed: {0}")]
    ReadFailure(String),

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Startup failed: {0}")]
    StartupFailure(String),
}

impl RelayError {
    /// Whether the error came from a failed or timed-out write.
    pub fn is_write_error(&self) -> bool {
        matches!(
            self,
            Self::WriteFailure(_) | Self::WriteTimeout(_) | Self::ConnectionClosed
        )
    }
}
