//! Concurrent user → session registry.
//!
//! At most one session is registered per user at any instant. Registering a
//! user that is already present displaces the previous session and hands it
//! back to the caller, who is responsible for closing it.

use dashmap::DashMap;
use uuid::Uuid;

use relayhub_protocols::StateListener;

use crate::session::Session;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// Live sessions keyed by user id.
///
/// Entries are never held locked across an `.await`; iteration goes through
/// [`ConnectionRegistry::sessions`], which returns a snapshot.
pub struct ConnectionRegistry {
    sessions: DashMap<String, Session>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert `session`, returning the session it displaced, if any.
    pub fn add_or_replace(&self, session: Session) -> Option<Session> {
        self.sessions.insert(session.user_id().to_string(), session)
    }

    /// Remove whatever session is registered for `user_id`. No-op if absent.
    pub fn remove(&self, user_id: &str) {
        self.sessions.remove(user_id);
    }

    /// Remove `session` only if it is still the one registered for its user.
    ///
    /// Returns `false` when the user has since logged in again elsewhere.
    pub fn remove_session(&self, session: &Session) -> bool {
        self.remove_if_current(session.user_id(), session.session_id())
    }

    fn remove_if_current(&self, user_id: &str, session_id: Uuid) -> bool {
        self.sessions
            .remove_if(user_id, |_, current| current.session_id() == session_id)
            .is_some()
    }

    pub fn get(&self, user_id: &str) -> Option<Session> {
        self.sessions.get(user_id).map(|entry| entry.value().clone())
    }

    /// The session with the highest level.
    ///
    /// Ties go to the lexicographically smallest user id so the answer does
    /// not depend on map iteration order.
    pub fn max_by_level(&self) -> Option<Session> {
        let mut best: Option<Session> = None;
        for entry in self.sessions.iter() {
            let candidate = entry.value();
            let better = match &best {
                None => true,
                Some(current) => {
                    candidate.level() > current.level()
                        || (candidate.level() == current.level()
                            && candidate.user_id() < current.user_id())
                }
            };
            if better {
                best = Some(candidate.clone());
            }
        }
        best
    }

    /// Snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StateListener for ConnectionRegistry {
    fn disconnect(&self, user_id: &str, session_id: Uuid) {
        self.remove_if_current(user_id, session_id);
    }
}
