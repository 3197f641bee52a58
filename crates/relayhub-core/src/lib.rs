//! # relayhub Core
//!
//! Connection core of the relayhub server: a WebSocket endpoint where each
//! logged-in user holds exactly one live session. Text frames from one user
//! are broadcast to every other user; binary frames carry a small control
//! protocol whose heartbeat is answered to the sender alone.
//!
//! ## Components
//!
//! - [`ConnectionRegistry`] - user id to session map, one session per user
//! - [`SessionLoop`] / [`Dispatcher`] - per-connection read loop and frame dispatch
//! - [`BroadcastEngine`] - concurrent fan-out with per-recipient deadlines
//! - [`ServerCore`] - listener, registration and shutdown

pub mod broadcast;
pub mod dispatcher;
pub mod registry;
pub mod server;
pub mod session;
pub mod session_loop;

#[cfg(test)]
mod test_support;

pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use dispatcher::Dispatcher;
pub use registry::ConnectionRegistry;
pub use server::{QueryAcceptor, ServerCore, ServerOptions, WsConnection};
pub use session::{Session, SessionState};
pub use session_loop::{CloseReason, SessionLoop};
