//! # relayhub Protocols
//!
//! Transport-independent building blocks for the relayhub connection core.
//! Contains the wire codec, the frame model and the capability traits the
//! core is written against - no networking.
//!
//! ## Contents
//!
//! - [`wire`] - the 6-byte-header binary control protocol (heartbeat)
//! - [`frame`] - an opcode + payload view over a WebSocket frame
//! - [`Connection`] / [`Agent`] - per-session I/O handles
//! - [`Acceptor`], [`StateListener`], [`MessageListener`] - extension seams

pub mod connection;
pub mod error;
pub mod frame;
pub mod listener;
pub mod wire;

pub use connection::{Agent, Connection};
pub use error::{ProtocolError, RelayError};
pub use frame::{Frame, OpCode};
pub use listener::{Acceptor, Handshake, Identity, MessageListener, StateListener};
pub use wire::{decode, encode, Command, ProtocolMessage};
