//! Handshake identity extraction.

use relayhub_protocols::{Acceptor, Handshake, Identity, RelayError};

/// Query parameter carrying the user id.
pub const USER_PARAM: &str = "user";
/// Optional query parameter carrying the session level.
pub const LEVEL_PARAM: &str = "level";

/// Reads `?user=<id>&level=<n>` from the upgrade request.
///
/// An absent or empty `user` rejects the connection. `level` defaults to 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAcceptor;

impl Acceptor for QueryAcceptor {
    fn accept(&self, handshake: &Handshake) -> Result<Identity, RelayError> {
        let user_id = handshake
            .param(USER_PARAM)
            .ok_or(RelayError::MissingIdentity)?;

        let level = match handshake.param(LEVEL_PARAM) {
            Some(raw) => raw.parse::<i64>().map_err(|e| {
                RelayError::HandshakeFailure(format!("invalid {} '{}': {}", LEVEL_PARAM, raw, e))
            })?,
            None => 0,
        };

        Ok(Identity::new(user_id, level))
    }
}
