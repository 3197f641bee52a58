//! Extension seams of the connection core.
//!
//! - [`Acceptor`]: turns an incoming handshake into a session identity
//! - [`StateListener`]: told when a session goes away
//! - [`MessageListener`]: receives inbound text from a session

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use uuid::Uuid;

use crate::connection::Agent;
use crate::error::RelayError;

/// What the acceptor sees of an upgrade request.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// Decoded query string parameters.
    pub query: HashMap<String, String>,
    pub remote_addr: Option<SocketAddr>,
}

impl Handshake {
    pub fn new(query: HashMap<String, String>, remote_addr: Option<SocketAddr>) -> Self {
        Self { query, remote_addr }
    }

    /// A query parameter, treating empty values as absent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// The identity a connection registers under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    /// Session priority; higher wins in `max_by_level`.
    pub level: i64,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, level: i64) -> Self {
        Self {
            user_id: user_id.into(),
            level,
        }
    }
}

/// Decides who a new connection belongs to.
///
/// Runs before the upgrade completes; an error rejects the connection before
/// any registry interaction.
pub trait Acceptor: Send + Sync {
    fn accept(&self, handshake: &Handshake) -> Result<Identity, RelayError>;
}

/// Connection state listener.
pub trait StateListener: Send + Sync {
    /// The session `session_id` of `user_id` has disconnected.
    fn disconnect(&self, user_id: &str, session_id: Uuid);
}

/// Inbound text message listener.
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn receive(&self, sender: &dyn Agent, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_param() {
        let mut query = HashMap::new();
        query.insert("user".to_string(), "alice".to_string());
        query.insert("level".to_string(), String::new());
        let handshake = Handshake::new(query, None);

        assert_eq!(handshake.param("user"), Some("alice"));
        assert_eq!(handshake.param("level"), None);
        assert_eq!(handshake.param("missing"), None);
    }

    #[test]
    fn test_identity_new() {
        let identity = Identity::new("bob", 3);
        assert_eq!(identity.user_id, "bob");
        assert_eq!(identity.level, 3);
    }
}
