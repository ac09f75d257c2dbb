//! Inbound frame handlers
//!
//! Decodes client frames and either applies them to the session
//! (subscription control) or forwards them to the router.

mod error;
mod subscription;

pub use error::{HandlerError, HandlerResult};
pub use subscription::SubscriptionHandler;

use crate::broadcast::EventPublisher;
use crate::connection::Session;
use crate::protocol::decode_frame;
use chat_core::{Envelope, EventKind};

/// Dispatch incoming client frames to the appropriate handler
pub struct InboundDispatcher;

impl InboundDispatcher {
    /// Handle one inbound text frame
    pub fn dispatch_text(
        session: &Session,
        publisher: &EventPublisher,
        text: &str,
        max_frame_bytes: usize,
    ) -> HandlerResult<()> {
        let envelope = decode_frame(text, max_frame_bytes)?;
        Self::dispatch(session, publisher, envelope)
    }

    /// Handle one decoded envelope
    pub fn dispatch(
        session: &Session,
        publisher: &EventPublisher,
        envelope: Envelope,
    ) -> HandlerResult<()> {
        tracing::trace!(
            session_id = %session.id(),
            kind = %envelope.kind,
            "Received envelope"
        );

        match envelope.kind {
            EventKind::Subscribe => SubscriptionHandler::subscribe(session, &envelope),
            EventKind::Unsubscribe => SubscriptionHandler::unsubscribe(session, &envelope),
            _ => {
                publisher.publish(Self::stamp(session, envelope));
                Ok(())
            }
        }
    }

    /// Attribute a client event to the connection's user
    fn stamp(session: &Session, mut envelope: Envelope) -> Envelope {
        envelope.sender_id = Some(session.user_id().clone());
        if envelope.timestamp.is_none() {
            envelope = envelope.stamped_now();
        }
        envelope
    }
}
