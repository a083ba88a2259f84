use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::services::ApplicationServices;
use crate::app::services::PodObserver;
use crate::config::WatcherConfig;
use crate::domain::SnapshotStore;
use crate::infrastructure::notifier::Dispatcher;
use crate::infrastructure::notifier::HealthMonitor;

const POD_KIND: &str = "Pod";

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, services: ApplicationServices, config: &WatcherConfig) {
        let ApplicationServices {
            store,
            observers,
            health_monitor,
            dispatcher,
        } = services;

        let health_task = self.spawn_health_monitor_task(health_monitor);
        self.tasks.push(health_task);

        let dispatcher_task = self.spawn_dispatcher_task(dispatcher);
        self.tasks.push(dispatcher_task);

        for observer in observers {
            let observer_task = self.spawn_observer_task(observer);
            self.tasks.push(observer_task);
        }

        if let Some(interval) = config.census_interval {
            let census_task = self.spawn_census_task(store, interval);
            self.tasks.push(census_task);
        }
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        // Set up signal handling for graceful shutdown
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            // Wait for shutdown signal
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();

                // Wait for all tasks with timeout
                self.wait_for_tasks_with_timeout(Duration::from_secs(30)).await;
            }
            // Wait for any task to complete unexpectedly
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, _index, _remaining) = result;
                self.cancellation_token.cancel();
                if let Err(e) = result {
                    tracing::error!("Task completed with error: {e}");
                    return Err(e.into());
                }
                tracing::warn!("Task completed unexpectedly");
            }
        }

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_health_monitor_task(&self, health_monitor: HealthMonitor) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting notifier health monitor task");
            health_monitor.run(token).await;
            tracing::info!("Notifier health monitor task completed");
        })
    }

    fn spawn_dispatcher_task(&self, dispatcher: Dispatcher) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting notification dispatcher task");
            dispatcher.run(token).await;
            tracing::info!("Notification dispatcher task completed");
        })
    }

    fn spawn_observer_task(&self, observer: PodObserver) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting Kubernetes pod observer task");
            if let Err(e) = observer.run(token).await {
                tracing::error!("Kubernetes pod observer failed: {e:?}");
            } else {
                tracing::info!("Kubernetes pod observer completed");
            }
        })
    }

    /// Periodically logs how many pods the snapshot holds.
    fn spawn_census_task(&self, store: Arc<SnapshotStore>, interval: Duration) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting pod census task");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let pods = store.len(POD_KIND);
                        tracing::info!(pods, "There are {pods} pods in the cluster");
                    }
                    _ = token.cancelled() => {
                        tracing::info!("Pod census task cancelled");
                        break;
                    }
                }
            }
        })
    }
}
