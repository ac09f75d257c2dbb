//! Event producer bridge
//!
//! What the request-handling layer calls after a mutation has been committed
//! to the store. Every method is fire-and-forget: a full queue loses the
//! realtime notification, never the caller's request.

use super::router::{Publication, RouterHandle};
use chat_core::{ConversationId, Envelope, ReactionAction, UserId};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EventPublisher {
    router: RouterHandle,
}

impl EventPublisher {
    pub fn new(router: RouterHandle) -> Self {
        Self { router }
    }

    /// Hand an envelope to the router
    ///
    /// Presence kinds go through the resolver first so the router receives
    /// them with their audience attached.
    pub fn publish(&self, envelope: Envelope) {
        let kind = &envelope.kind;
        if kind.is_control() {
            debug!(kind = %kind, "Control events are session-local, ignoring");
            return;
        }
        if kind.is_presence() {
            self.router.presence.relay(envelope);
            return;
        }
        self.router.try_publish(Publication::new(envelope));
    }

    /// A message was persisted in a conversation
    pub fn message_sent(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
    ) {
        self.publish(Envelope::message(conversation_id, sender_id, content));
    }

    pub fn reaction_changed(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        message_id: &str,
        emoji: &str,
        action: ReactionAction,
    ) {
        self.publish(Envelope::reaction(
            conversation_id,
            user_id,
            message_id,
            emoji,
            action,
        ));
    }

    pub fn message_read(&self, conversation_id: ConversationId, reader_id: UserId, message_id: &str) {
        self.publish(Envelope::read_receipt(conversation_id, reader_id, message_id));
    }

    /// Persist the user's online flag and tell their friends
    pub fn presence_changed(&self, user_id: UserId, online: bool) {
        self.router.presence.changed(user_id, online);
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.router.registry().is_online(user_id)
    }

    pub fn router(&self) -> &RouterHandle {
        &self.router
    }
}
