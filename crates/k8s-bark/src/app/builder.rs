use std::sync::Arc;

use anyhow::Result;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;

use crate::app::services::ApplicationServices;
use crate::app::services::PodObserver;
use crate::app::Application;
use crate::config::WatcherConfig;
use crate::domain::notification_queue;
use crate::domain::NotificationSender;
use crate::domain::Observer;
use crate::domain::SnapshotStore;
use crate::domain::NOTIFICATION_QUEUE_CAPACITY;
use crate::infrastructure::k8s::KubeChangeSource;
use crate::infrastructure::kube_client;
use crate::infrastructure::notifier::AvailabilityFlag;
use crate::infrastructure::notifier::BarkClient;
use crate::infrastructure::notifier::Dispatcher;
use crate::infrastructure::notifier::HealthMonitor;

/// Application builder
pub struct ApplicationBuilder {
    config: WatcherConfig,
}

impl ApplicationBuilder {
    /// Create new application builder
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    /// Build complete application.
    ///
    /// Connects to the cluster and completes the initial pod listing of every
    /// watched namespace; any failure here is fatal.
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let client = kube_client::init_kube_client(
            self.config.location,
            self.config.kubeconfig.clone(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;

        let bark_client = Arc::new(
            BarkClient::new(&self.config.notifier)
                .map_err(|e| anyhow::anyhow!("Failed to initialize Bark client: {e:?}"))?,
        );

        let store = Arc::new(SnapshotStore::new());
        let (sender, receiver) = notification_queue(NOTIFICATION_QUEUE_CAPACITY);
        let observers = self.create_observers(client, store.clone(), sender).await?;

        let availability = AvailabilityFlag::new();
        let health_monitor = HealthMonitor::new(
            bark_client.clone(),
            availability.clone(),
            self.config.notifier.probe_interval,
        );
        let dispatcher = Dispatcher::new(bark_client, availability, receiver);

        let services = ApplicationServices {
            store,
            observers,
            health_monitor,
            dispatcher,
        };
        Ok(Application::new(services, self.config))
    }

    /// Create and prime one observer per namespace scope.
    async fn create_observers(
        &self,
        client: Client,
        store: Arc<SnapshotStore>,
        sender: NotificationSender,
    ) -> Result<Vec<PodObserver>> {
        let scopes: Vec<Option<String>> = if self.config.namespaces.is_empty() {
            vec![None]
        } else {
            self.config.namespaces.iter().cloned().map(Some).collect()
        };

        let mut observers = Vec::with_capacity(scopes.len());
        for namespace in scopes {
            let source = KubeChangeSource::<Pod>::new(client.clone(), namespace);
            let mut observer = Observer::new(
                source,
                store.clone(),
                sender.clone(),
                self.config.list_timeout,
            );
            observer
                .prime()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load initial pod listing: {e:?}"))?;
            observers.push(observer);
        }
        Ok(observers)
    }
}
