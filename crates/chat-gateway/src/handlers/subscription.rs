//! Subscribe / unsubscribe
//!
//! Handled entirely inside the session; the router only ever reads the set.
//! A frame naming several conversations applies to each of them.

use super::{HandlerError, HandlerResult};
use crate::connection::Session;
use chat_core::Envelope;

pub struct SubscriptionHandler;

impl SubscriptionHandler {
    pub fn subscribe(session: &Session, envelope: &Envelope) -> HandlerResult<()> {
        Self::require_topic(envelope)?;

        for conversation_id in envelope.topics() {
            if session.subscribe(conversation_id.clone()) {
                tracing::debug!(
                    session_id = %session.id(),
                    conversation_id = %conversation_id,
                    "Subscribed"
                );
            }
        }
        Ok(())
    }

    pub fn unsubscribe(session: &Session, envelope: &Envelope) -> HandlerResult<()> {
        Self::require_topic(envelope)?;

        for conversation_id in envelope.topics() {
            if session.unsubscribe(conversation_id) {
                tracing::debug!(
                    session_id = %session.id(),
                    conversation_id = %conversation_id,
                    "Unsubscribed"
                );
            }
        }
        Ok(())
    }

    fn require_topic(envelope: &Envelope) -> HandlerResult<()> {
        match envelope.topic() {
            Some(_) => Ok(()),
            None => Err(HandlerError::MissingConversation(envelope.kind.clone())),
        }
    }
}
