//! PostgreSQL implementation of UserDirectory

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::{DomainError, RepoResult, UserDirectory, UserId};

use super::error::map_db_error;

/// PostgreSQL implementation of UserDirectory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new PgUserDirectory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn friend_ids(&self, user_id: &UserId) -> RepoResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, String>(
            r"
            SELECT CASE WHEN user_id_1 = $1 THEN user_id_2 ELSE user_id_1 END
            FROM friendships
            WHERE (user_id_1 = $1 OR user_id_2 = $1) AND status = 'accepted'
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn set_online(&self, user_id: &UserId, online: bool) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET online = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .bind(online)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(user_id.clone()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for PgUserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgUserDirectory")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}
