//! Test fixtures and frame builders

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user id no other test will use
pub fn unique_user(prefix: &str) -> String {
    format!("{prefix}-{}", unique_suffix())
}

/// A conversation id no other test will use
pub fn unique_conversation() -> String {
    format!("conv-{}", unique_suffix())
}

pub fn subscribe_frame(conversation_id: &str) -> Value {
    json!({ "type": "subscribe", "conversationId": conversation_id })
}

pub fn unsubscribe_frame(conversation_id: &str) -> Value {
    json!({ "type": "unsubscribe", "conversationId": conversation_id })
}

pub fn typing_frame(conversation_id: &str) -> Value {
    json!({ "type": "typing", "conversationId": conversation_id })
}

/// `/presence/:user_id` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub user_id: String,
    pub online: bool,
}

/// Error body returned by the gateway's HTTP surface
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
