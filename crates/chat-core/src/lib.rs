//! # chat-core
//!
//! Domain layer containing identifiers, realtime envelopes, store ports and domain errors.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::DomainError;
pub use events::{Envelope, EventKind, ReactionAction};
pub use traits::{RepoResult, UserDirectory};
pub use value_objects::{ConversationId, SessionId, UserId};
