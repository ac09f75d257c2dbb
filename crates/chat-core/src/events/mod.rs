//! Realtime events shared between the gateway and its producers

mod envelope;
mod kind;

pub use envelope::{Envelope, ReactionAction};
pub use kind::EventKind;
