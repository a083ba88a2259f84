//! Delivery side of the pipeline: the Bark HTTP client, the liveness monitor that
//! publishes notifier availability, and the dispatcher draining the queue.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod health;

pub use client::BarkClient;
pub use dispatcher::DeliveryOutcome;
pub use dispatcher::DispatchStats;
pub use dispatcher::Dispatcher;
pub use error::NotifierError;
pub use health::Availability;
pub use health::AvailabilityFlag;
pub use health::HealthMonitor;
