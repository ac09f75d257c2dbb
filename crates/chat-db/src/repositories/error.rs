//! Error handling utilities for repositories

use chat_core::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
///
/// Pool and I/O failures mean the store is unreachable rather than that the
/// query was wrong.
pub fn map_db_error(e: SqlxError) -> DomainError {
    match e {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            DomainError::Unavailable(e.to_string())
        }
        other => DomainError::DatabaseError(other.to_string()),
    }
}
