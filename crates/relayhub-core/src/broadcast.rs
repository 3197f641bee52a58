//! Broadcast fan-out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, warn};

use relayhub_protocols::{Agent, Frame, MessageListener, RelayError};

use crate::registry::ConnectionRegistry;

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Delivers text from one session to every other registered session.
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Send `message` to everyone except `sender_id`.
    ///
    /// Writes run concurrently, each under its own deadline, so a slow or
    /// broken recipient neither delays nor prevents delivery to the rest.
    pub async fn send(&self, sender_id: &str, message: &str) -> BroadcastReport {
        let recipients: Vec<_> = self
            .registry
            .sessions()
            .into_iter()
            .filter(|session| session.user_id() != sender_id)
            .collect();

        let writes = recipients.iter().map(|recipient| async move {
            let result = recipient
                .write_with_deadline(Frame::text(message), self.write_timeout)
                .await;
            (recipient, result)
        });

        let mut report = BroadcastReport::default();
        for (recipient, result) in join_all(writes).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) if e.is_write_error() => {
                    report.failed += 1;
                    warn!(
                        from = %sender_id,
                        to = %recipient.user_id(),
                        error = %e,
                        "Broadcast write failed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        from = %sender_id,
                        to = %recipient.user_id(),
                        error = %e,
                        "Broadcast frame rejected"
                    );
                }
            }
        }

        debug!(
            from = %sender_id,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Deliver one frame to a single registered user.
    pub async fn push(&self, user_id: &str, frame: Frame) -> Result<(), RelayError> {
        let session = self
            .registry
            .get(user_id)
            .ok_or_else(|| RelayError::NotFound(user_id.to_string()))?;
        session.write_with_deadline(frame, self.write_timeout).await
    }
}

#[async_trait]
impl MessageListener for BroadcastEngine {
    async fn receive(&self, sender: &dyn Agent, message: &str) {
        self.send(sender.id(), message).await;
    }
}
