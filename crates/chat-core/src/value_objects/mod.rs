//! Value objects

mod ids;

pub use ids::{ConversationId, SessionId, UserId};
