//! Connection session
//!
//! The live state of one authenticated WebSocket connection: its outbound
//! queue, conversation subscriptions and lifecycle state. The reader and
//! writer loops own the transport; everything here is shared with the router.

use crate::protocol::CloseCode;
use chat_core::{ConversationId, SessionId, UserId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;

/// Session lifecycle state
///
/// Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Transport upgraded, identity not yet bound
    Connecting = 0,
    /// Token verified
    Authenticated = 1,
    /// Installed in the registry
    Registered = 2,
    /// Reader and writer loops running
    Active = 3,
    /// Loops ending, unregister pending
    Terminating = 4,
    Closed = 5,
}

impl SessionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticated,
            2 => Self::Registered,
            3 => Self::Active,
            4 => Self::Terminating,
            _ => Self::Closed,
        }
    }
}

/// Failure to enqueue an outbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Outbound queue is full")]
    Full,

    #[error("Outbound queue is closed")]
    Closed,
}

/// A single client connection
pub struct Session {
    id: SessionId,
    user_id: UserId,
    /// `None` once closed; dropping the sender ends the writer loop
    outbound: Mutex<Option<mpsc::Sender<Arc<str>>>>,
    subscriptions: Mutex<HashSet<ConversationId>>,
    state: AtomicU8,
    close_code: Mutex<Option<CloseCode>>,
    connected_at: Instant,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue
    pub fn new(user_id: UserId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = Arc::new(Self {
            id: SessionId::generate(),
            user_id,
            outbound: Mutex::new(Some(tx)),
            subscriptions: Mutex::new(HashSet::new()),
            state: AtomicU8::new(SessionState::Connecting as u8),
            close_code: Mutex::new(None),
            connected_at: Instant::now(),
        });
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is ahead of the current state
    ///
    /// Returns `false` if the session was already at or past `next`.
    pub fn advance(&self, next: SessionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (next as u8 > current).then_some(next as u8)
            })
            .is_ok()
    }

    /// Add a conversation; returns `false` if already subscribed
    pub fn subscribe(&self, conversation_id: ConversationId) -> bool {
        self.subscriptions.lock().insert(conversation_id)
    }

    /// Remove a conversation; returns `false` if it was not subscribed
    pub fn unsubscribe(&self, conversation_id: &ConversationId) -> bool {
        self.subscriptions.lock().remove(conversation_id)
    }

    pub fn is_subscribed(&self, conversation_id: &ConversationId) -> bool {
        self.subscriptions.lock().contains(conversation_id)
    }

    /// Snapshot of the current subscriptions
    pub fn subscriptions(&self) -> Vec<ConversationId> {
        self.subscriptions.lock().iter().cloned().collect()
    }

    /// Non-blocking enqueue of a serialized frame
    pub fn try_enqueue(&self, frame: Arc<str>) -> Result<(), SendError> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(SendError::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Close the outbound queue with a reason
    ///
    /// Frames already queued are still flushed by the writer, which then sends
    /// a close frame carrying the reason. Only the first call has any effect;
    /// returns whether this call closed the queue.
    pub fn close(&self, code: CloseCode) -> bool {
        let Some(tx) = self.outbound.lock().take() else {
            return false;
        };
        self.close_code.lock().get_or_insert(code);
        drop(tx);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Reason given when the queue was closed
    pub fn close_code(&self) -> Option<CloseCode> {
        *self.close_code.lock()
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
