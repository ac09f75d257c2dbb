//! Event broadcasting
//!
//! The router that fans events out to sessions, and the bridge producers use
//! to feed it.

mod presence;
mod publisher;
mod router;
mod stats;

pub use publisher::EventPublisher;
pub use router::{BroadcastRouter, Publication, RouterError, RouterHandle};
pub use stats::{RouterStats, RouterStatsSnapshot};
