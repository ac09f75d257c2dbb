//! # chat-db
//!
//! Adapters for the [`UserDirectory`](chat_core::UserDirectory) port.
//!
//! - [`PgUserDirectory`] reads accepted friendships and writes the `online`
//!   flag in PostgreSQL via SQLx.
//! - [`InMemoryUserDirectory`] keeps everything in process, for development
//!   and tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_db::{create_pool, run_migrations, PgUserDirectory, PoolSettings};
//!
//! async fn example(config: &chat_common::DatabaseConfig) -> Result<(), sqlx::Error> {
//!     let pool = create_pool(&PoolSettings::from(config)).await?;
//!     run_migrations(&pool).await?;
//!     let directory = PgUserDirectory::new(pool);
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use memory::InMemoryUserDirectory;
pub use pool::{create_pool, run_migrations, PgPool, PoolSettings};
pub use repositories::PgUserDirectory;
