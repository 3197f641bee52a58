//! Wire and frame level errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Payload too large: {size} bytes, max {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid opcode: {0:#x}")]
    InvalidOpCode(u8),
}
