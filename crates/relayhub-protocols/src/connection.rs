//! Per-session I/O handles.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::frame::Frame;

/// The write half of one client connection, plus its close signal.
///
/// Implementations must make [`Connection::close`] idempotent: only the first
/// call has an effect and returns `true`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Peer address, when the transport knows it.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Write one frame to the peer.
    async fn write_frame(&self, frame: Frame) -> Result<(), RelayError>;

    /// Close the connection. Returns `false` if it was already closed.
    fn close(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Resolves once [`Connection::close`] has been called.
    async fn closed(&self);
}

/// An addressable sender: something that has an identity and can be pushed to.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity the agent is registered under.
    fn id(&self) -> &str;

    /// Push one frame to the agent.
    async fn push(&self, frame: Frame) -> Result<(), RelayError>;
}
