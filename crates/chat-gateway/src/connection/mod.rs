//! Connection management
//!
//! Per-connection session state and the registry of online users.

mod registry;
mod session;

pub use registry::PresenceRegistry;
pub use session::{SendError, Session, SessionState};
