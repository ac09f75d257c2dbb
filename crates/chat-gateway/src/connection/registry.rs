//! Presence registry
//!
//! Maps each online user to their one active session. Structural changes are
//! made only by the broadcast router; reads are safe from anywhere.

use super::Session;
use chat_core::UserId;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    sessions: DashMap<UserId, Arc<Session>>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session` for its user, returning the session it replaced
    pub(crate) fn insert(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.sessions.insert(session.user_id().clone(), session)
    }

    /// Remove the entry for `session`'s user only if it is still `session`
    pub(crate) fn remove_if_current(&self, session: &Session) -> bool {
        self.sessions
            .remove_if(session.user_id(), |_, current| current.id() == session.id())
            .is_some()
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<Arc<Session>> {
        self.sessions.get(user_id).map(|entry| entry.value().clone())
    }

    /// Point-in-time copy of every registered session
    ///
    /// Callers iterate the copy, so no shard lock is held while they work.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
