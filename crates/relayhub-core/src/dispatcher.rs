//! Data frame dispatch.
//!
//! Text frames go to the message listener as UTF-8 strings tagged with the
//! sending session. Binary frames carry the control protocol; only the
//! heartbeat request is answered, and only to the session that sent it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use relayhub_protocols::{decode, Command, Frame, MessageListener, OpCode, ProtocolMessage};

use crate::session::Session;

pub struct Dispatcher {
    listener: Arc<dyn MessageListener>,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(listener: Arc<dyn MessageListener>, write_timeout: Duration) -> Self {
        Self {
            listener,
            write_timeout,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Hand a data frame off to its own task.
    ///
    /// Returns `None` for opcodes that are not dispatched. The caller is not
    /// expected to wait on the handle.
    pub fn dispatch(self: &Arc<Self>, session: &Session, frame: Frame) -> Option<JoinHandle<()>> {
        match frame.opcode() {
            OpCode::Text => {
                let this = self.clone();
                let session = session.clone();
                Some(tokio::spawn(async move {
                    this.handle_text(&session, frame.into_payload()).await;
                }))
            }
            OpCode::Binary => {
                let this = self.clone();
                let session = session.clone();
                Some(tokio::spawn(async move {
                    this.handle_binary(&session, frame.into_payload()).await;
                }))
            }
            _ => None,
        }
    }

    async fn handle_text(&self, session: &Session, payload: Vec<u8>) {
        match String::from_utf8(payload) {
            Ok(text) => self.listener.receive(session, &text).await,
            Err(e) => {
                warn!(user = %session.user_id(), error = %e, "Dropping non UTF-8 text frame");
            }
        }
    }

    async fn handle_binary(&self, session: &Session, payload: Vec<u8>) {
        let message = match decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    user = %session.user_id(),
                    len = payload.len(),
                    error = %e,
                    "Dropping malformed control message"
                );
                return;
            }
        };

        match message.command() {
            Command::Ping => {
                let pong = Frame::binary(ProtocolMessage::pong().encode());
                if let Err(e) = session.write_with_deadline(pong, self.write_timeout).await {
                    warn!(user = %session.user_id(), error = %e, "Heartbeat reply failed");
                } else {
                    debug!(user = %session.user_id(), "Heartbeat");
                }
            }
            command => {
                debug!(
                    user = %session.user_id(),
                    command = command.as_u16(),
                    length = message.length,
                    "Ignoring control message"
                );
            }
        }
    }
}
