//! Notifier liveness tracking.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use tokio::select;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::infrastructure::notifier::client::BarkClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Availability {
    Available,
    Unavailable,
}

/// Process-wide notifier availability.
///
/// Written only by the [`HealthMonitor`], read by the dispatcher before each
/// delivery. Starts out [`Availability::Available`].
#[derive(Debug, Clone)]
pub struct AvailabilityFlag {
    available: Arc<AtomicBool>,
}

impl Default for AvailabilityFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityFlag {
    pub fn new() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn get(&self) -> Availability {
        if self.available.load(Ordering::Acquire) {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        self.get() == Availability::Available
    }

    /// Publishes a new state and returns the previous one.
    pub fn set(&self, availability: Availability) -> Availability {
        let was_available = self
            .available
            .swap(availability == Availability::Available, Ordering::AcqRel);
        if was_available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

/// Periodically probes the notifier and publishes the result.
pub struct HealthMonitor {
    client: Arc<BarkClient>,
    flag: AvailabilityFlag,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(client: Arc<BarkClient>, flag: AvailabilityFlag, interval: Duration) -> Self {
        Self {
            client,
            flag,
            interval,
        }
    }

    /// Probes on every interval tick until cancelled.
    #[tracing::instrument(skip_all, fields(notifier = %self.client.base_url(), interval = ?self.interval))]
    pub async fn run(self, cancellation_token: CancellationToken) {
        info!("Starting notifier health monitor");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Health monitor shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
    }

    /// Runs a single probe and returns the state published afterwards.
    ///
    /// Transport failures and non-success statuses mark the notifier unavailable. A
    /// malformed body is reported and the previous state is kept.
    pub async fn probe_once(&self) -> Availability {
        match self.client.probe().await {
            Ok(availability) => self.publish(availability),
            Err(e) if e.current_context().is_protocol() => {
                let current = self.flag.get();
                error!("Notifier liveness reply violates contract, keeping {current}: {e:?}");
                current
            }
            Err(e) => {
                warn!("Notifier liveness probe failed: {e}");
                self.publish(Availability::Unavailable)
            }
        }
    }

    fn publish(&self, availability: Availability) -> Availability {
        let previous = self.flag.set(availability);
        if previous != availability {
            match availability {
                Availability::Available => info!("Notifier is available again"),
                Availability::Unavailable => warn!("Notifier became unavailable"),
            }
        }
        availability
    }
}
