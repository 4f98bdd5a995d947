use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::notifications::DispatchStats;
use crate::observability::workflow_metrics;
use crate::workflows::WorkflowEngine;

/// Graceful shutdown coordinator for the workflow engine and its dispatcher
pub struct ShutdownCoordinator {
    dispatcher_task: Option<JoinHandle<DispatchStats>>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            dispatcher_task: None,
            drain_timeout,
        }
    }

    pub fn track_dispatcher(mut self, task: JoinHandle<DispatchStats>) -> Self {
        self.dispatcher_task = Some(task);
        self
    }

    /// Stops accepting work, then lets the dispatcher drain pending outcomes.
    ///
    /// Dropping the engine closes its queue handle. Any other handle still alive
    /// keeps the queue open until the timeout aborts the dispatcher.
    pub async fn shutdown(self, engine: WorkflowEngine) -> Result<DispatchStats> {
        info!("Initiating graceful shutdown of the workflow engine...");
        drop(engine);

        let stats = match self.dispatcher_task {
            Some(task) => drain_dispatcher(task, self.drain_timeout).await?,
            None => DispatchStats::default(),
        };

        workflow_metrics().log_stats();
        info!("Graceful shutdown completed successfully");
        Ok(stats)
    }
}

/// Wait for the dispatcher to empty its queue
async fn drain_dispatcher(
    mut task: JoinHandle<DispatchStats>,
    drain_timeout: Duration,
) -> Result<DispatchStats> {
    info!(timeout_ms = drain_timeout.as_millis() as u64, "Draining pending notifications...");

    match timeout(drain_timeout, &mut task).await {
        Ok(Ok(stats)) => {
            info!(
                outcomes = stats.outcomes,
                delivered = stats.delivered,
                failed = stats.failed,
                "Notification queue drained"
            );
            Ok(stats)
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Notification dispatcher panicked: {}", e)),
        Err(_) => {
            warn!("Timeout waiting for notifications to drain, aborting dispatcher");
            task.abort();
            Err(anyhow::anyhow!("Timeout waiting for notifications to drain"))
        }
    }
}
