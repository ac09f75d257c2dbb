//! Realtime event kinds
//!
//! The `type` field of every envelope exchanged with clients.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Kind of a realtime event
///
/// Unknown kinds are preserved verbatim in [`EventKind::Other`] so they can be
/// relayed unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// New message persisted in a conversation
    Message,
    /// User is typing in a conversation
    Typing,
    /// Client asks to receive a conversation's events (client only)
    Subscribe,
    /// Client stops receiving a conversation's events (client only)
    Unsubscribe,
    /// Reaction added to or removed from a message
    Reaction,
    /// Message marked as read
    ReadReceipt,
    /// User came online
    Online,
    /// User went offline
    Offline,
    /// Anything else
    Other(String),
}

impl EventKind {
    /// Parse from the wire string
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "message" => Self::Message,
            "typing" => Self::Typing,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "reaction" => Self::Reaction,
            "read_receipt" => Self::ReadReceipt,
            "online" => Self::Online,
            "offline" => Self::Offline,
            other => Self::Other(other.to_string()),
        }
    }

    /// Get the wire string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Typing => "typing",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Reaction => "reaction",
            Self::ReadReceipt => "read_receipt",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Other(name) => name,
        }
    }

    /// Subscription control handled inside the session
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Subscribe | Self::Unsubscribe)
    }

    /// Presence change delivered to the sender's friends
    #[must_use]
    pub const fn is_presence(&self) -> bool {
        matches!(self, Self::Online | Self::Offline)
    }

    /// Conversation-scoped event delivered to subscribers
    #[must_use]
    pub const fn is_topic(&self) -> bool {
        matches!(
            self,
            Self::Message | Self::Typing | Self::Reaction | Self::ReadReceipt
        )
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
