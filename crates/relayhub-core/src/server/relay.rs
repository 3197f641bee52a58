//! Relay server lifecycle.
//!
//! [`ServerCore`] owns the registry and the listener. Every accepted and
//! upgraded connection is registered here and then driven by its own
//! [`SessionLoop`](crate::SessionLoop) task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use relayhub_config::ServerConfig;
use relayhub_protocols::{Acceptor, Connection, Frame, Identity, RelayError};

use crate::broadcast::BroadcastEngine;
use crate::dispatcher::Dispatcher;
use crate::registry::ConnectionRegistry;
use crate::session::Session;

use super::acceptor::QueryAcceptor;
use super::router::create_router;

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Immutable server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub id: String,
    /// `host:port` to bind.
    pub listen: String,
    /// Rolling idle deadline per session.
    pub read_timeout: Duration,
    /// Deadline for each individual write.
    pub write_timeout: Duration,
}

impl ServerOptions {
    pub fn new(id: impl Into<String>, listen: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            listen: listen.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl From<&ServerConfig> for ServerOptions {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.id.clone(), config.listen_addr())
            .with_read_timeout(config.read_timeout())
            .with_write_timeout(config.write_timeout())
    }
}

pub(crate) struct RelayState {
    pub(crate) options: ServerOptions,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) broadcast: Arc<BroadcastEngine>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) acceptor: Arc<dyn Acceptor>,
    shutdown: CancellationToken,
    shutdown_once: OnceCell<usize>,
    sweep_lock: Mutex<()>,
}

/// The relay server. Cheap to clone; clones share one server.
#[derive(Clone)]
pub struct ServerCore {
    pub(crate) state: Arc<RelayState>,
}

impl ServerCore {
    /// Create a server that identifies clients by their `user` query
    /// parameter.
    pub fn new(options: ServerOptions) -> Self {
        Self::with_acceptor(options, Arc::new(QueryAcceptor))
    }

    pub fn with_acceptor(options: ServerOptions, acceptor: Arc<dyn Acceptor>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcast = Arc::new(BroadcastEngine::new(
            registry.clone(),
            options.write_timeout,
        ));
        let dispatcher = Arc::new(Dispatcher::new(broadcast.clone(), options.write_timeout));

        Self {
            state: Arc::new(RelayState {
                options,
                registry,
                broadcast,
                dispatcher,
                acceptor,
                shutdown: CancellationToken::new(),
                shutdown_once: OnceCell::new(),
                sweep_lock: Mutex::new(()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.state.options.id
    }

    pub fn options(&self) -> &ServerOptions {
        &self.state.options
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    pub fn broadcast(&self) -> &Arc<BroadcastEngine> {
        &self.state.broadcast
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutdown.is_cancelled()
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, RelayError> {
        let listen = &self.state.options.listen;
        TcpListener::bind(listen.as_str())
            .await
            .map_err(|e| RelayError::StartupFailure(format!("bind {}: {}", listen, e)))
    }

    /// Serve connections from `listener` until [`ServerCore::shutdown`].
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RelayError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::StartupFailure(e.to_string()))?;
        info!(server_id = %self.id(), addr = %local_addr, "Relay server listening");

        let app = create_router(self.clone());
        let shutdown = self.state.shutdown.clone();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RelayError::StartupFailure(e.to_string()))?;

        info!(server_id = %self.id(), "Relay server stopped");
        Ok(())
    }

    /// Bind and serve.
    pub async fn start(&self) -> Result<(), RelayError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Register a freshly upgraded connection.
    ///
    /// Any session already registered for the same user is displaced and its
    /// connection closed. Once shutdown has begun the connection is closed
    /// and `ShuttingDown` returned instead.
    pub fn register(
        &self,
        identity: Identity,
        connection: Arc<dyn Connection>,
    ) -> Result<Session, RelayError> {
        if self.is_shutting_down() {
            connection.close();
            return Err(RelayError::ShuttingDown);
        }

        let session = Session::from_identity(identity, connection);
        if let Some(displaced) = self.state.registry.add_or_replace(session.clone()) {
            displaced.connection().close();
            info!(
                user = %session.user_id(),
                old_session = %displaced.session_id(),
                new_session = %session.session_id(),
                "Session displaced by new login"
            );
        }

        // Shutdown may have swept the registry between the check and insert.
        if self.is_shutting_down() {
            self.state.registry.remove_session(&session);
            session.connection().close();
            return Err(RelayError::ShuttingDown);
        }

        info!(
            user = %session.user_id(),
            session_id = %session.session_id(),
            level = session.level(),
            remote = ?session.connection().remote_addr(),
            "Session registered"
        );
        Ok(session)
    }

    /// Deliver one frame to a single user.
    pub async fn push(&self, user_id: &str, frame: Frame) -> Result<(), RelayError> {
        self.state.broadcast.push(user_id, frame).await
    }

    /// Stop accepting connections and close every registered session.
    ///
    /// Runs once; concurrent and later callers wait for the first sweep and
    /// get the same count of connections it closed. In-flight dispatch tasks
    /// are not awaited.
    pub async fn shutdown(&self) -> usize {
        *self.state.shutdown_once.get_or_init(|| self.sweep()).await
    }

    async fn sweep(&self) -> usize {
        let _guard = self.state.sweep_lock.lock().await;
        self.state.shutdown.cancel();
        debug!(users = ?self.state.registry.user_ids(), "Closing sessions");

        let closed = self
            .state
            .registry
            .sessions()
            .iter()
            .filter(|session| session.connection().close())
            .count();

        info!(server_id = %self.id(), closed, "Relay server shutting down");
        closed
    }
}
