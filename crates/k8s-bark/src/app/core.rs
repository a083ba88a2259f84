use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::tasks::Tasks;
use crate::config::WatcherConfig;

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    config: WatcherConfig,
}

impl Application {
    /// Create new application with explicit service dependencies
    pub fn new(services: ApplicationServices, config: WatcherConfig) -> Self {
        Self { services, config }
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new();
        tasks.spawn_all_tasks(self.services, &self.config);

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }
}
