//! Watches a Kubernetes cluster's pod lifecycle and relays notifications to a
//! Bark push-notification server.
//!
//! Data flows `cluster watch -> Observer -> notification queue -> Dispatcher -> Bark`,
//! with the `HealthMonitor` gating deliveries on notifier availability.

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export main modules
pub use domain::classifier;
pub use domain::observer;
pub use domain::snapshot_store;
pub use infrastructure::k8s;
pub use infrastructure::kube_client;
pub use infrastructure::notifier;
