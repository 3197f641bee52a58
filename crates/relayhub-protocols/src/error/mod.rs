//! Error types for the relayhub protocol layer.

mod protocol;
mod relay;

pub use protocol::*;
pub use relay::*;
