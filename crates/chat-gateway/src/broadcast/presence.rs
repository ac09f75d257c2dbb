//! Presence resolution
//!
//! Graph fan-out needs the sender's friend list, which lives in the external
//! store. Store calls never run inside the router loop: presence work is
//! queued to a single resolver task that persists the online flag, looks up
//! the audience and then hands the router a fully targeted publication. One
//! task keeps a user's online/offline changes in the order they happened.

use super::router::Publication;
use super::stats::RouterStats;
use chat_core::{Envelope, UserDirectory, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

#[derive(Debug)]
enum PresenceJob {
    /// Session registered or removed; persist and announce
    Changed { user_id: UserId, online: bool },
    /// Producer-supplied presence envelope; announce only
    Relay(Envelope),
}

/// Sending side of the resolver queue
#[derive(Clone)]
pub(crate) struct PresenceNotifier {
    jobs: mpsc::Sender<PresenceJob>,
    stats: Arc<RouterStats>,
}

impl PresenceNotifier {
    /// Start the resolver task
    ///
    /// The resolver holds only a weak handle to the publish queue so it never
    /// keeps the router alive on its own.
    pub(crate) fn spawn(
        directory: Arc<dyn UserDirectory>,
        publish_tx: mpsc::WeakSender<Publication>,
        capacity: usize,
        stats: Arc<RouterStats>,
    ) -> Self {
        let (jobs, rx) = mpsc::channel(capacity);
        let resolver = PresenceResolver {
            jobs: rx,
            directory,
            publish_tx,
            stats: stats.clone(),
        };
        tokio::spawn(resolver.run());
        Self { jobs, stats }
    }

    pub(crate) fn changed(&self, user_id: UserId, online: bool) {
        self.submit(PresenceJob::Changed { user_id, online });
    }

    pub(crate) fn relay(&self, envelope: Envelope) {
        self.submit(PresenceJob::Relay(envelope));
    }

    fn submit(&self, job: PresenceJob) {
        if let Err(e) = self.jobs.try_send(job) {
            self.stats.record_dropped();
            warn!(job = ?e.into_inner(), "Presence queue unavailable, dropping change");
        }
    }
}

struct PresenceResolver {
    jobs: mpsc::Receiver<PresenceJob>,
    directory: Arc<dyn UserDirectory>,
    publish_tx: mpsc::WeakSender<Publication>,
    stats: Arc<RouterStats>,
}

impl PresenceResolver {
    async fn run(mut self) {
        while let Some(job) = self.jobs.recv().await {
            self.handle(job).await;
        }
        debug!("Presence resolver stopped");
    }

    async fn handle(&self, job: PresenceJob) {
        let envelope = match job {
            PresenceJob::Changed { user_id, online } => {
                // Best-effort; the realtime notification goes out regardless.
                if let Err(e) = self.directory.set_online(&user_id, online).await {
                    warn!(user_id = %user_id, online, error = %e, "Failed to persist presence");
                }
                Envelope::presence(user_id, online)
            }
            PresenceJob::Relay(envelope) => envelope,
        };

        let Some(user_id) = envelope.sender_id.clone() else {
            debug!(kind = %envelope.kind, "Presence event without sender, ignoring");
            return;
        };

        let audience = match self.directory.friend_ids(&user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to resolve friends for presence");
                return;
            }
        };
        if audience.is_empty() {
            trace!(user_id = %user_id, "No friends to notify");
            return;
        }

        let Some(publish_tx) = self.publish_tx.upgrade() else {
            return;
        };
        if publish_tx
            .try_send(Publication::to_audience(envelope, audience))
            .is_err()
        {
            self.stats.record_dropped();
            trace!(user_id = %user_id, "Publish queue full, presence change dropped");
        }
    }
}
