//! WebSocket close codes
//!
//! Sent in the close frame when the server ends a session.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Peer closed or the session ended cleanly
    Normal = 1000,
    /// Unknown error occurred
    UnknownError = 4000,
    /// No pong within the liveness window
    SessionTimeout = 4009,
    /// Outbound queue overflowed; evicted by the router
    SlowConsumer = 4013,
    /// Replaced by a newer connection of the same user
    Superseded = 4014,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(Self::Normal),
            4000 => Some(Self::UnknownError),
            4009 => Some(Self::SessionTimeout),
            4013 => Some(Self::SlowConsumer),
            4014 => Some(Self::Superseded),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close code
    ///
    /// A superseded client already has a newer connection; reconnecting would
    /// just evict that one.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        matches!(
            self,
            Self::UnknownError | Self::SessionTimeout | Self::SlowConsumer
        )
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Normal closure",
            Self::UnknownError => "Unknown error occurred",
            Self::SessionTimeout => "Session timeout",
            Self::SlowConsumer => "Client too slow to keep up",
            Self::Superseded => "Replaced by a newer connection",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::UnknownError => "UnknownError",
            Self::SessionTimeout => "SessionTimeout",
            Self::SlowConsumer => "SlowConsumer",
            Self::Superseded => "Superseded",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
