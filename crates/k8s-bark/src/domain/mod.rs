//! Event-to-notification pipeline.
//!
//! Consumes [`ChangeEvent`]s from a [`ChangeSource`], keeps the [`SnapshotStore`]
//! current and turns novel changes into [`Notification`]s. Cluster access goes
//! through the [`ChangeSource`] seam; only its error type, `KubernetesError`, is
//! shared with the infrastructure layer. Nothing here speaks HTTP.

pub mod classifier;
pub mod notification;
pub mod observer;
pub mod queue;
pub mod resource;
pub mod snapshot_store;
pub mod traits;

pub use notification::Action;
pub use notification::Notification;
pub use observer::Observer;
pub use observer::ObserverStats;
pub use resource::ChangeEvent;
pub use resource::Listing;
pub use resource::ResourceRecord;
pub use resource::WatchItem;
pub use snapshot_store::SnapshotStore;
pub use traits::ChangeSource;
pub use queue::notification_queue;
pub use queue::NotificationReceiver;
pub use queue::NotificationSender;
pub use queue::NOTIFICATION_QUEUE_CAPACITY;
