//! HTTP server and routing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use relayhub_protocols::{Handshake, Identity, StateListener};

use crate::session_loop::SessionLoop;

use super::connection::{frame_stream, WsConnection};
use super::relay::ServerCore;

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

/// Create the router for the relay endpoint.
pub fn create_router(core: ServerCore) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(core)
}

/// WebSocket upgrade handler.
///
/// The acceptor runs before the upgrade; rejected handshakes never reach the
/// registry.
async fn ws_handler(
    State(core): State<ServerCore>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let handshake = Handshake::new(query, Some(remote));
    let identity = match core.state.acceptor.accept(&handshake) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(remote = %remote, error = %e, "Handshake rejected");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if core.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(remote = %remote, user = %identity.user_id, error = %rejection, "Upgrade rejected");
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(move |e| {
            warn!(remote = %remote, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(core, socket, identity, remote))
}

/// Drive one upgraded connection to completion.
async fn handle_socket(core: ServerCore, socket: WebSocket, identity: Identity, remote: SocketAddr) {
    let (sink, stream) = socket.split();
    let connection = WsConnection::spawn(sink, Some(remote));

    let session = match core.register(identity, connection) {
        Ok(session) => session,
        Err(e) => {
            debug!(remote = %remote, error = %e, "Connection refused after upgrade");
            return;
        }
    };

    let listener: Arc<dyn StateListener> = core.state.registry.clone();
    let mut session_loop = SessionLoop::new(
        session,
        frame_stream(stream),
        core.state.dispatcher.clone(),
        listener,
        core.state.options.read_timeout,
    );
    session_loop.run().await;
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    server_id: String,
    connections: usize,
}

/// Health check endpoint.
async fn health_check(State(core): State<ServerCore>) -> Json<Health> {
    let status = if core.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(Health {
        status,
        server_id: core.id().to_string(),
        connections: core.registry().len(),
    })
}
