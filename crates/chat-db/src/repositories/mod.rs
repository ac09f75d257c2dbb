//! PostgreSQL repository implementations

mod error;
mod user_directory;

pub use error::map_db_error;
pub use user_directory::PgUserDirectory;
