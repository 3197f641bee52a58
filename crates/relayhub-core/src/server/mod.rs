//! WebSocket server: upgrade endpoint, connection handles and lifecycle.

mod acceptor;
mod connection;
mod relay;
mod router;

pub use acceptor::{QueryAcceptor, LEVEL_PARAM, USER_PARAM};
pub use connection::{frame_stream, frame_to_message, message_to_frame, WsConnection};
pub use relay::{ServerCore, ServerOptions, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
pub use router::create_router;
