//! Drains the notification queue into the notifier.
//!
//! Delivery is at-most-once: a notification is dropped when the notifier is known
//! to be unavailable, and a failed push is logged but never retried or requeued.
//! Push failures do not touch the availability flag; only the health monitor does.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::domain::Notification;
use crate::domain::NotificationReceiver;
use crate::infrastructure::notifier::client::BarkClient;
use crate::infrastructure::notifier::health::AvailabilityFlag;
use crate::infrastructure::notifier::NotifierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Skipped because the notifier was unavailable.
    Dropped,
    Failed,
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub delivered: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered => &self.delivered,
            DeliveryOutcome::Dropped => &self.dropped,
            DeliveryOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct Dispatcher {
    client: Arc<BarkClient>,
    flag: AvailabilityFlag,
    queue: NotificationReceiver,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(client: Arc<BarkClient>, flag: AvailabilityFlag, queue: NotificationReceiver) -> Self {
        Self {
            client,
            flag,
            queue,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Delivers queued notifications until cancelled or every producer is gone.
    #[tracing::instrument(skip_all, fields(notifier = %self.client.base_url()))]
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        info!("Starting notification dispatcher");
        loop {
            let next = select! {
                _ = cancellation_token.cancelled() => {
                    info!("Dispatcher shutdown requested");
                    break;
                }
                next = self.queue.recv() => next,
            };
            let Some(notification) = next else {
                info!("Notification queue closed");
                break;
            };
            self.dispatch(notification).await;
        }

        let stats = self.stats.snapshot();
        info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            failed = stats.failed,
            "Dispatcher stopped"
        );
    }

    /// Waits for the next queued notification and dispatches it.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn process_next(&mut self) -> Option<DeliveryOutcome> {
        let notification = self.queue.recv().await?;
        Some(self.dispatch(notification).await)
    }

    /// Delivers one notification if the notifier is available.
    pub async fn dispatch(&self, notification: Notification) -> DeliveryOutcome {
        let outcome = if !self.flag.is_available() {
            warn!(
                kind = %notification.kind,
                action = %notification.action,
                subject = %notification.subject,
                "Notifier unavailable, dropping notification"
            );
            DeliveryOutcome::Dropped
        } else {
            match self.client.push(&notification).await {
                Ok(()) => {
                    info!(
                        kind = %notification.kind,
                        action = %notification.action,
                        subject = %notification.subject,
                        "Notification delivered"
                    );
                    DeliveryOutcome::Delivered
                }
                Err(e) => {
                    let category = match e.current_context() {
                        NotifierError::Transport { .. } => "transport",
                        NotifierError::Protocol { .. } => "protocol",
                        NotifierError::Rejected { .. } | NotifierError::Status { .. } => "rejected",
                        NotifierError::Configuration { .. } => "configuration",
                    };
                    error!(
                        category,
                        kind = %notification.kind,
                        action = %notification.action,
                        subject = %notification.subject,
                        detail = %notification.detail,
                        "Notification delivery failed: {e:?}"
                    );
                    DeliveryOutcome::Failed
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }
}
