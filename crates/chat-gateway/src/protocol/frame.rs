//! Wire framing
//!
//! One envelope per inbound text frame. Outbound, several queued envelopes
//! may share a frame, separated by `\n`.

use chat_core::Envelope;
use std::sync::Arc;
use thiserror::Error;

/// Separator between envelopes in a coalesced outbound frame
pub const FRAME_DELIMITER: char = '\n';

/// Reasons an inbound frame is discarded
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Binary frames are not supported")]
    Binary,

    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one inbound text frame
pub fn decode_frame(text: &str, max_bytes: usize) -> Result<Envelope, FrameError> {
    if text.len() > max_bytes {
        return Err(FrameError::TooLarge {
            size: text.len(),
            limit: max_bytes,
        });
    }
    Ok(Envelope::from_json(text)?)
}

/// Join serialized envelopes into a single frame payload
#[must_use]
pub fn coalesce(frames: &[Arc<str>]) -> String {
    let capacity = frames.iter().map(|f| f.len() + 1).sum();
    let mut out = String::with_capacity(capacity);
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            out.push(FRAME_DELIMITER);
        }
        out.push_str(frame);
    }
    out
}
