//! Binary control protocol carried inside WebSocket binary frames.
//!
//! ```text
//! offset 0 : command (2 bytes, big-endian u16)
//! offset 2 : length  (4 bytes, big-endian u32)
//! offset 6 : payload (length bytes)
//! ```

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

/// Size of the command + length header.
pub const HEADER_SIZE: usize = 6;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Command codes. Only the heartbeat pair is interpreted by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Heartbeat request (100).
    Ping,
    /// Heartbeat reply (101).
    Pong,
    Other(u16),
}

impl Command {
    pub const PING: u16 = 100;
    pub const PONG: u16 = 101;

    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ping => Self::PING,
            Self::Pong => Self::PONG,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for Command {
    fn from(code: u16) -> Self {
        match code {
            Self::PING => Self::Ping,
            Self::PONG => Self::Pong,
            other => Self::Other(other),
        }
    }
}

impl From<Command> for u16 {
    fn from(command: Command) -> Self {
        command.as_u16()
    }
}

/// A decoded control message.
///
/// `length` always equals `payload.len()` for values built through
/// [`ProtocolMessage::new`] or [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub command: u16,
    pub length: u32,
    pub payload: Vec<u8>,
}

impl ProtocolMessage {
    pub fn new(command: impl Into<u16>, payload: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        let length = payload_length(payload.len())?;
        Ok(Self {
            command: command.into(),
            length,
            payload,
        })
    }

    /// Heartbeat request with an empty payload.
    pub fn ping() -> Self {
        Self {
            command: Command::PING,
            length: 0,
            payload: Vec::new(),
        }
    }

    /// Heartbeat reply with an empty payload.
    pub fn pong() -> Self {
        Self {
            command: Command::PONG,
            length: 0,
            payload: Vec::new(),
        }
    }

    pub fn command(&self) -> Command {
        Command::from(self.command)
    }

    pub fn encode(&self) -> Vec<u8> {
        write_message(self.command, self.length, &self.payload)
    }
}

/// Encode `[command][length][payload]`.
pub fn encode(command: u16, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let length = payload_length(payload.len())?;
    Ok(write_message(command, length, payload))
}

/// Decode one message from the front of `buf`.
///
/// Bytes past the declared payload are ignored. A declared length larger
/// than what follows the header is rejected rather than read past.
pub fn decode(buf: &[u8]) -> Result<ProtocolMessage, ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Err(ProtocolError::MalformedMessage(format!(
            "message is {} bytes, header needs {}",
            buf.len(),
            HEADER_SIZE
        )));
    }

    let mut header = &buf[..HEADER_SIZE];
    let command = header.get_u16();
    let length = header.get_u32();

    let available = buf.len() - HEADER_SIZE;
    let declared = length as usize;
    if declared > available {
        return Err(ProtocolError::MalformedMessage(format!(
            "declared length {} exceeds {} available bytes",
            declared, available
        )));
    }

    Ok(ProtocolMessage {
        command,
        length,
        payload: buf[HEADER_SIZE..HEADER_SIZE + declared].to_vec(),
    })
}

fn payload_length(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD_SIZE,
    })
}

fn write_message(command: u16, length: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.put_u16(command);
    out.put_u32(length);
    out.put_slice(payload);
    out
}
