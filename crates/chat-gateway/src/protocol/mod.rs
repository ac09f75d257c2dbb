//! Gateway protocol definitions
//!
//! Close codes and the framing of envelopes on the WebSocket.

mod close_codes;
mod frame;

pub use close_codes::CloseCode;
pub use frame::{coalesce, decode_frame, FrameError, FRAME_DELIMITER};
