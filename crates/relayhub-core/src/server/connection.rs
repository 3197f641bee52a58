//! WebSocket connection management.
//!
//! The socket is split on upgrade: the read half becomes a frame stream for
//! the session loop, the write half is owned by a writer task fed through a
//! channel. [`WsConnection`] is the handle the rest of the core writes to.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relayhub_protocols::{Connection, Frame, OpCode, ProtocolError, RelayError};

/// Queued writes per connection before writers start waiting.
const OUTBOUND_BUFFER: usize = 32;

/// How long the writer spends on the close handshake once closed.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Convert an inbound transport message into a frame.
pub fn message_to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::text(text.as_str()),
        Message::Binary(data) => Frame::binary(data.to_vec()),
        Message::Ping(data) => Frame::ping(data.to_vec()),
        Message::Pong(data) => Frame::pong(data.to_vec()),
        Message::Close(_) => Frame::close(),
    }
}

/// Convert an outbound frame into a transport message.
///
/// Continuation frames are reassembled by the transport and cannot be sent
/// on their own.
pub fn frame_to_message(frame: Frame) -> Result<Message, RelayError> {
    let opcode = frame.opcode();
    let payload = frame.into_payload();
    let message = match opcode {
        OpCode::Text => {
            let text = String::from_utf8(payload)
                .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
            Message::Text(text.into())
        }
        OpCode::Binary => Message::Binary(payload.into()),
        OpCode::Ping => Message::Ping(payload.into()),
        OpCode::Pong => Message::Pong(payload.into()),
        OpCode::Close => Message::Close(None),
        OpCode::Continuation => return Err(ProtocolError::InvalidOpCode(opcode.as_u8()).into()),
    };
    Ok(message)
}

/// Adapt the read half of a socket into the stream the session loop reads.
pub fn frame_stream<S, E>(messages: S) -> impl Stream<Item = Result<Frame, RelayError>> + Unpin + Send
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display,
{
    messages.map(|result| {
        result
            .map(message_to_frame)
            .map_err(|e| RelayError::ReadFailure(e.to_string()))
    })
}

struct Outbound {
    message: Message,
    ack: oneshot::Sender<Result<(), RelayError>>,
}

/// Write handle for one WebSocket client.
pub struct WsConnection {
    remote_addr: Option<SocketAddr>,
    outbound: mpsc::Sender<Outbound>,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl WsConnection {
    /// Take ownership of the write half and spawn its writer task.
    pub fn spawn<S>(sink: S, remote_addr: Option<SocketAddr>) -> Arc<Self>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
    {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let cancel = CancellationToken::new();
        tokio::spawn(write_loop(sink, rx, cancel.clone(), remote_addr));

        Arc::new(Self {
            remote_addr,
            outbound: tx,
            closed: AtomicBool::new(false),
            cancel,
        })
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    remote_addr: Option<SocketAddr>,
) where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display + Send,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = outbound.recv() => {
                let Some(Outbound { message, ack }) = next else {
                    break;
                };
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = sink.send(message) => {
                        sent.map_err(|e| RelayError::WriteFailure(e.to_string()))
                    }
                };
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    break;
                }
            }
        }
    }

    // Best effort close handshake; the peer may already be gone.
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    })
    .await;
    debug!(remote = ?remote_addr, "WebSocket writer stopped");
}

#[async_trait]
impl Connection for WsConnection {
    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    async fn write_frame(&self, frame: Frame) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::ConnectionClosed);
        }
        let message = frame_to_message(frame)?;
        let (ack, done) = oneshot::channel();
        self.outbound
            .send(Outbound { message, ack })
            .await
            .map_err(|_| RelayError::ConnectionClosed)?;
        done.await.map_err(|_| RelayError::ConnectionClosed)?
    }

    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}
