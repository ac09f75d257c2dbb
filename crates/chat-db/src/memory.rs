//! In-process implementation of UserDirectory
//!
//! Used when no `DATABASE_URL` is configured and by the gateway's tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

use chat_core::{DomainError, RepoResult, UserDirectory, UserId};

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    friends: RwLock<HashMap<UserId, HashSet<UserId>>>,
    online: RwLock<HashMap<UserId, bool>>,
    fail_writes: AtomicBool,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted friendship between two users
    pub fn add_friendship(&self, a: &UserId, b: &UserId) {
        if a == b {
            return;
        }
        let mut friends = self.friends.write();
        friends.entry(a.clone()).or_default().insert(b.clone());
        friends.entry(b.clone()).or_default().insert(a.clone());
    }

    /// Remove a friendship in both directions
    pub fn remove_friendship(&self, a: &UserId, b: &UserId) {
        let mut friends = self.friends.write();
        if let Some(set) = friends.get_mut(a) {
            set.remove(b);
        }
        if let Some(set) = friends.get_mut(b) {
            set.remove(a);
        }
    }

    /// Last persisted online flag, `None` if never written
    pub fn online_flag(&self, user_id: &UserId) -> Option<bool> {
        self.online.read().get(user_id).copied()
    }

    /// Make subsequent `set_online` calls fail as if the store were down
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    #[instrument(skip(self), level = "trace")]
    async fn friend_ids(&self, user_id: &UserId) -> RepoResult<Vec<UserId>> {
        let mut ids: Vec<UserId> = self
            .friends
            .read()
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    #[instrument(skip(self), level = "trace")]
    async fn set_online(&self, user_id: &UserId, online: bool) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(DomainError::Unavailable("writes disabled".to_string()));
        }
        self.online.write().insert(user_id.clone(), online);
        Ok(())
    }
}
