//! # chat-gateway
//!
//! Realtime delivery over WebSocket: authenticated sessions, topic
//! subscriptions, a single broadcast router and presence fan-out to friends.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use broadcast::{BroadcastRouter, EventPublisher, Publication, RouterHandle};
pub use connection::{PresenceRegistry, Session, SessionState};
pub use protocol::CloseCode;
pub use server::{create_app, create_gateway_state, run, run_server, GatewayError, GatewayState};
