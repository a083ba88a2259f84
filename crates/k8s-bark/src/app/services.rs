use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use crate::domain::Observer;
use crate::domain::SnapshotStore;
use crate::infrastructure::k8s::KubeChangeSource;
use crate::infrastructure::notifier::Dispatcher;
use crate::infrastructure::notifier::HealthMonitor;

pub type PodObserver = Observer<KubeChangeSource<Pod>>;

/// Application dependencies, each handed to its own task at startup.
pub struct ApplicationServices {
    pub store: Arc<SnapshotStore>,
    /// One primed observer per namespace scope.
    pub observers: Vec<PodObserver>,
    pub health_monitor: HealthMonitor,
    pub dispatcher: Dispatcher,
}
