//! Integration test utilities for the chat gateway
//!
//! Spins up a real gateway on a local port and drives it over HTTP and
//! WebSocket.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
