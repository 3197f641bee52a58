//! In-memory connection used by unit tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use relayhub_protocols::{Connection, Frame, RelayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteBehavior {
    Deliver,
    Fail,
    Hang,
}

/// Records written frames on a channel instead of a socket.
pub(crate) struct MockConnection {
    behavior: WriteBehavior,
    written: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    close_signal: CancellationToken,
}

impl MockConnection {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        Self::with_behavior(WriteBehavior::Deliver)
    }

    /// Every write fails immediately.
    pub(crate) fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        Self::with_behavior(WriteBehavior::Fail)
    }

    /// Every write blocks forever.
    pub(crate) fn hanging() -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        Self::with_behavior(WriteBehavior::Hang)
    }

    fn with_behavior(behavior: WriteBehavior) -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            behavior,
            written: tx,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            close_signal: CancellationToken::new(),
        });
        (conn, rx)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn write_frame(&self, frame: Frame) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::ConnectionClosed);
        }
        match self.behavior {
            WriteBehavior::Deliver => {
                let _ = self.written.send(frame);
                Ok(())
            }
            WriteBehavior::Fail => Err(RelayError::WriteFailure("broken pipe".to_string())),
            WriteBehavior::Hang => std::future::pending().await,
        }
    }

    fn close(&self) -> bool {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.close_signal.cancel();
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn closed(&self) {
        self.close_signal.cancelled().await;
    }
}
