//! WebSocket frame view.
//!
//! A [`Frame`] is the opcode + payload pair the connection core works with.
//! Frames that arrive masked keep their masking key until the payload is
//! first read, at which point the key is applied once and discarded.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use std::fmt;

use crate::error::ProtocolError;

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;

/// Frame opcode, numbered as in RFC 6455.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_u8(byte).ok_or(ProtocolError::InvalidOpCode(byte))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continuation => "continuation",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Close => "close",
            Self::Ping => "ping",
            Self::Pong => "pong",
        };
        f.write_str(name)
    }
}

/// XOR `buf` in place with a 4-byte masking key, starting at key offset 0.
///
/// Masking is an involution: applying the same key twice restores the input.
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

/// One transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: OpCode,
    payload: Vec<u8>,
    /// Present while `payload` still holds masked bytes.
    mask: Option<[u8; 4]>,
}

impl Frame {
    /// Create an unmasked frame.
    pub fn new(opcode: OpCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
            mask: None,
        }
    }

    /// Create a frame from bytes exactly as they arrived on the wire.
    ///
    /// When `mask` is set the payload is treated as masked and is unmasked
    /// lazily by [`Frame::payload`].
    pub fn from_wire(opcode: OpCode, payload: impl Into<Vec<u8>>, mask: Option<[u8; 4]>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
            mask,
        }
    }

    /// Mask `payload` with `key` the way a client would before sending.
    pub fn masked(opcode: OpCode, payload: impl Into<Vec<u8>>, key: [u8; 4]) -> Self {
        let mut payload = payload.into();
        apply_mask(&mut payload, key);
        Self::from_wire(opcode, payload, Some(key))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(OpCode::Text, text.into().into_bytes())
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Binary, payload)
    }

    pub fn ping(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Ping, payload)
    }

    pub fn pong(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Pong, payload)
    }

    pub fn close() -> Self {
        Self::new(OpCode::Close, Vec::<u8>::new())
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn set_opcode(&mut self, opcode: OpCode) {
        self.opcode = opcode;
    }

    /// Replace the stored bytes. The masked flag is left untouched, so raw
    /// wire bytes may be stored into a frame whose key is still pending.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// The unmasked payload.
    pub fn payload(&mut self) -> &[u8] {
        self.unmask();
        &self.payload
    }

    /// Consume the frame, returning the unmasked payload.
    pub fn into_payload(mut self) -> Vec<u8> {
        self.unmask();
        self.payload
    }

    fn unmask(&mut self) {
        if let Some(key) = self.mask.take() {
            apply_mask(&mut self.payload, key);
        }
    }
}
