//! User directory port
//!
//! The durable store as seen by the realtime core: who a user's friends are
//! and where to record whether they are online. The core only reads the
//! social graph and writes the presence flag; everything else about users,
//! conversations and messages belongs to the request-handling layer.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::value_objects::UserId;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// IDs of users with an accepted friendship with `user_id`, in either direction
    async fn friend_ids(&self, user_id: &UserId) -> RepoResult<Vec<UserId>>;

    /// Persist the user's online flag
    async fn set_online(&self, user_id: &UserId, online: bool) -> RepoResult<()>;
}
