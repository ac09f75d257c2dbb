//! Handler error types

use crate::protocol::FrameError;
use chat_core::EventKind;
use thiserror::Error;

/// Why an inbound frame was discarded
///
/// None of these end the connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("{0} requires a conversationId")]
    MissingConversation(EventKind),
}

impl HandlerError {
    /// Short label for logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Frame(FrameError::TooLarge { .. }) => "too_large",
            Self::Frame(FrameError::Binary) => "binary",
            Self::Frame(FrameError::Malformed(_)) => "malformed",
            Self::MissingConversation(_) => "missing_conversation",
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
