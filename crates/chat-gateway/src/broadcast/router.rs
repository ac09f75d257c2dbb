//! Broadcast router
//!
//! A single task owns registry mutation and event fan-out. It consumes three
//! bounded queues (register, unregister, publish) with fair selection, so
//! order holds within each queue but not across them.

use super::presence::PresenceNotifier;
use super::stats::{RouterStats, RouterStatsSnapshot};
use crate::connection::{PresenceRegistry, SendError, Session, SessionState};
use crate::protocol::CloseCode;
use chat_common::RealtimeConfig;
use chat_core::{Envelope, UserDirectory, UserId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// An envelope on its way to the router
#[derive(Debug, Clone)]
pub struct Publication {
    pub envelope: Envelope,
    /// Resolved recipients for graph fan-out; `None` for everything else
    pub audience: Option<Vec<UserId>>,
}

impl Publication {
    /// Route by the envelope's kind
    #[must_use]
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            audience: None,
        }
    }

    /// Deliver only to these users' sessions
    #[must_use]
    pub fn to_audience(envelope: Envelope, audience: Vec<UserId>) -> Self {
        Self {
            envelope,
            audience: Some(audience),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Broadcast router has shut down")]
    Closed,
}

struct RegistryRequest {
    session: Arc<Session>,
    ack: oneshot::Sender<()>,
}

/// Handle for talking to a running router
///
/// The router stops once every handle has been dropped.
#[derive(Clone)]
pub struct RouterHandle {
    register_tx: mpsc::Sender<RegistryRequest>,
    unregister_tx: mpsc::Sender<RegistryRequest>,
    publish_tx: mpsc::Sender<Publication>,
    pub(crate) presence: PresenceNotifier,
    registry: Arc<PresenceRegistry>,
    stats: Arc<RouterStats>,
}

impl RouterHandle {
    /// Install a session, returning once the registry reflects it
    pub async fn register(&self, session: Arc<Session>) -> Result<(), RouterError> {
        Self::request(&self.register_tx, session).await
    }

    /// Remove a session if it is still the current one for its user
    pub async fn unregister(&self, session: Arc<Session>) -> Result<(), RouterError> {
        Self::request(&self.unregister_tx, session).await
    }

    async fn request(
        queue: &mpsc::Sender<RegistryRequest>,
        session: Arc<Session>,
    ) -> Result<(), RouterError> {
        let (ack, done) = oneshot::channel();
        queue
            .send(RegistryRequest { session, ack })
            .await
            .map_err(|_| RouterError::Closed)?;
        done.await.map_err(|_| RouterError::Closed)
    }

    /// Enqueue without waiting; returns `false` if the publication was dropped
    pub fn try_publish(&self, publication: Publication) -> bool {
        match self.publish_tx.try_send(publication) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(p)) => {
                self.stats.record_dropped();
                trace!(kind = %p.envelope.kind, "Publish queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(p)) => {
                self.stats.record_dropped();
                debug!(kind = %p.envelope.kind, "Router stopped, dropping event");
                false
            }
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandle")
            .field("online", &self.registry.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// The serialized fan-out loop
pub struct BroadcastRouter {
    registry: Arc<PresenceRegistry>,
    register_rx: mpsc::Receiver<RegistryRequest>,
    unregister_rx: mpsc::Receiver<RegistryRequest>,
    publish_rx: mpsc::Receiver<Publication>,
    presence: PresenceNotifier,
    stats: Arc<RouterStats>,
}

impl BroadcastRouter {
    /// Start the router and its presence resolver
    pub fn spawn(
        config: &RealtimeConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> (RouterHandle, JoinHandle<()>) {
        let (register_tx, register_rx) = mpsc::channel(config.control_queue_capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(config.control_queue_capacity);
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue_capacity);

        let registry = Arc::new(PresenceRegistry::new());
        let stats = Arc::new(RouterStats::default());
        let presence = PresenceNotifier::spawn(
            directory,
            publish_tx.downgrade(),
            config.publish_queue_capacity,
            stats.clone(),
        );

        let router = Self {
            registry: registry.clone(),
            register_rx,
            unregister_rx,
            publish_rx,
            presence: presence.clone(),
            stats: stats.clone(),
        };
        let task = tokio::spawn(router.run());
        info!("Broadcast router started");

        let handle = RouterHandle {
            register_tx,
            unregister_tx,
            publish_tx,
            presence,
            registry,
            stats,
        };
        (handle, task)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(request) = self.register_rx.recv() => self.handle_register(request),
                Some(request) = self.unregister_rx.recv() => self.handle_unregister(request),
                Some(publication) = self.publish_rx.recv() => self.handle_publish(publication),
                else => break,
            }
        }

        let stats = self.stats.snapshot();
        info!(
            published = stats.published,
            delivered = stats.delivered,
            dropped = stats.dropped,
            evicted = stats.evicted,
            "Broadcast router stopped"
        );
    }

    fn handle_register(&self, request: RegistryRequest) {
        let RegistryRequest { session, ack } = request;
        session.advance(SessionState::Registered);

        if let Some(previous) = self.registry.insert(session.clone()) {
            if previous.id() != session.id() {
                // Last connection wins; the old one is told why it is going away.
                previous.close(CloseCode::Superseded);
                info!(
                    user_id = %session.user_id(),
                    old_session = %previous.id(),
                    new_session = %session.id(),
                    "Session superseded"
                );
            }
        }

        debug!(user_id = %session.user_id(), session_id = %session.id(), "Session registered");
        self.presence.changed(session.user_id().clone(), true);
        let _ = ack.send(());
    }

    fn handle_unregister(&self, request: RegistryRequest) {
        let RegistryRequest { session, ack } = request;

        if self.registry.remove_if_current(&session) {
            debug!(user_id = %session.user_id(), session_id = %session.id(), "Session unregistered");
            self.presence.changed(session.user_id().clone(), false);
        } else {
            trace!(session_id = %session.id(), "Stale unregister ignored");
        }
        session.close(CloseCode::Normal);
        let _ = ack.send(());
    }

    fn handle_publish(&self, publication: Publication) {
        let Publication { envelope, audience } = publication;
        self.stats.record_published();

        let frame: Arc<str> = match envelope.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(error = %e, kind = %envelope.kind, "Failed to serialize envelope");
                return;
            }
        };

        let targets = self.targets(&envelope, audience);
        let mut delivered = 0;
        for session in targets {
            match session.try_enqueue(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::Full) => self.evict(&session),
                Err(SendError::Closed) => self.remove_closed(&session),
            }
        }
        self.stats.record_delivered(delivered);

        trace!(kind = %envelope.kind, delivered, "Event dispatched");
    }

    fn targets(&self, envelope: &Envelope, audience: Option<Vec<UserId>>) -> Vec<Arc<Session>> {
        let kind = &envelope.kind;

        if kind.is_topic() {
            let Some(conversation_id) = envelope.topic() else {
                debug!(kind = %kind, "Topic event without conversation, dropping");
                return Vec::new();
            };
            return self
                .registry
                .snapshot()
                .into_iter()
                .filter(|session| session.is_subscribed(conversation_id))
                .collect();
        }

        if kind.is_presence() {
            let Some(audience) = audience else {
                debug!(kind = %kind, "Presence event without audience, dropping");
                return Vec::new();
            };
            return audience
                .iter()
                .filter_map(|user_id| self.registry.lookup(user_id))
                .collect();
        }

        if kind.is_control() {
            debug!(kind = %kind, "Control events never leave the session, dropping");
            return Vec::new();
        }

        self.registry.snapshot()
    }

    fn evict(&self, session: &Arc<Session>) {
        session.close(CloseCode::SlowConsumer);
        if self.registry.remove_if_current(session) {
            self.stats.record_evicted();
            warn!(
                user_id = %session.user_id(),
                session_id = %session.id(),
                "Evicted slow consumer"
            );
            self.presence.changed(session.user_id().clone(), false);
        }
    }

    /// A session whose loops are ending but whose unregister has not arrived yet
    fn remove_closed(&self, session: &Arc<Session>) {
        if self.registry.remove_if_current(session) {
            debug!(
                user_id = %session.user_id(),
                session_id = %session.id(),
                "Removed closed session ahead of unregister"
            );
            self.presence.changed(session.user_id().clone(), false);
        }
    }
}
