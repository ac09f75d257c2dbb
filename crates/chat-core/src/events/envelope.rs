//! Realtime envelope
//!
//! The structured unit of realtime data. One envelope travels per WebSocket
//! frame from the client; the server may coalesce several into one frame.

use super::EventKind;
use crate::value_objects::{ConversationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Whether a reaction was added or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Add,
    Remove,
}

/// Realtime event envelope
///
/// Wire format: `{type, conversationId?, senderId?, content?, data?, timestamp?}`.
/// Inbound frames may name the conversation with the legacy `chatId` or
/// `groupId` keys instead; see [`Envelope::topics`]. Immutable once handed to
/// the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "InboundEnvelope")]
pub struct Envelope {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Target conversation (topic events and subscription control)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    /// Further conversations named by the same inbound frame
    #[serde(skip)]
    pub linked_conversations: Vec<ConversationId>,

    /// Originating user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,

    /// Text content (messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Arbitrary structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// When the underlying mutation happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Client-side shape, with the legacy conversation keys kept apart
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: EventKind,
    conversation_id: Option<ConversationId>,
    chat_id: Option<ConversationId>,
    group_id: Option<ConversationId>,
    sender_id: Option<UserId>,
    content: Option<String>,
    data: Option<Value>,
    timestamp: Option<DateTime<Utc>>,
}

impl From<InboundEnvelope> for Envelope {
    /// The first non-empty of `conversationId`, `chatId`, `groupId` becomes
    /// the conversation; any other distinct ids are kept as linked.
    fn from(raw: InboundEnvelope) -> Self {
        let mut ids = [raw.conversation_id, raw.chat_id, raw.group_id]
            .into_iter()
            .flatten()
            .filter(|id| !id.is_empty());

        let conversation_id = ids.next();
        let mut linked_conversations: Vec<ConversationId> = Vec::new();
        for id in ids {
            if conversation_id.as_ref() != Some(&id) && !linked_conversations.contains(&id) {
                linked_conversations.push(id);
            }
        }

        Self {
            kind: raw.kind,
            conversation_id,
            linked_conversations,
            sender_id: raw.sender_id,
            content: raw.content,
            data: raw.data,
            timestamp: raw.timestamp,
        }
    }
}

impl Envelope {
    /// Create a bare envelope of the given kind
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            conversation_id: None,
            linked_conversations: Vec::new(),
            sender_id: None,
            content: None,
            data: None,
            timestamp: None,
        }
    }

    /// A message persisted in a conversation
    #[must_use]
    pub fn message(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            sender_id: Some(sender_id),
            content: Some(content.into()),
            ..Self::new(EventKind::Message)
        }
        .stamped_now()
    }

    /// Typing indicator
    #[must_use]
    pub fn typing(conversation_id: ConversationId, sender_id: UserId) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            sender_id: Some(sender_id),
            ..Self::new(EventKind::Typing)
        }
        .stamped_now()
    }

    /// Reaction added or removed on a message
    #[must_use]
    pub fn reaction(
        conversation_id: ConversationId,
        sender_id: UserId,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
    ) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            sender_id: Some(sender_id),
            data: Some(json!({
                "messageId": message_id,
                "emoji": emoji,
                "action": action,
            })),
            ..Self::new(EventKind::Reaction)
        }
        .stamped_now()
    }

    /// Message marked as read
    #[must_use]
    pub fn read_receipt(conversation_id: ConversationId, sender_id: UserId, message_id: &str) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            sender_id: Some(sender_id),
            data: Some(json!({ "messageId": message_id })),
            ..Self::new(EventKind::ReadReceipt)
        }
        .stamped_now()
    }

    /// Presence change for a user
    #[must_use]
    pub fn presence(user_id: UserId, online: bool) -> Self {
        let kind = if online {
            EventKind::Online
        } else {
            EventKind::Offline
        };

        Self {
            data: Some(json!({ "userId": user_id, "online": online })),
            sender_id: Some(user_id),
            ..Self::new(kind)
        }
        .stamped_now()
    }

    /// Subscription control for a conversation
    #[must_use]
    pub fn subscribe(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            ..Self::new(EventKind::Subscribe)
        }
    }

    /// Stop receiving a conversation's events
    #[must_use]
    pub fn unsubscribe(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            ..Self::new(EventKind::Unsubscribe)
        }
    }

    /// Attach a structured payload
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set an explicit timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the timestamp to now
    #[must_use]
    pub fn stamped_now(self) -> Self {
        self.with_timestamp(Utc::now())
    }

    /// Conversation ID, ignoring empty strings
    pub fn topic(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref().filter(|id| !id.is_empty())
    }

    /// Every conversation this envelope names, the routing topic first
    pub fn topics(&self) -> impl Iterator<Item = &ConversationId> {
        self.topic().into_iter().chain(&self.linked_conversations)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.conversation_id {
            Some(conversation) => write!(f, "Envelope(type={}, conversation={conversation})", self.kind),
            None => write!(f, "Envelope(type={})", self.kind),
        }
    }
}
