// Notification Dispatcher - consumes committed transitions from a bounded queue,
// resolves audiences at dispatch time and delivers with bounded retry.
// Nothing here can reach back into the workflow commit.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use super::audience::AudienceResolver;
use super::retry::DeliveryRetryHandler;
use super::sink::NotificationSink;
use super::templates::{plan_notifications, AudienceTarget};
use super::types::{DispatchError, TransitionOutcome};
use crate::observability::workflow_metrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub outcomes: u64,
    pub delivered: u64,
    pub failed: u64,
    pub unresolved_targets: u64,
    pub empty_audiences: u64,
}

impl DispatchStats {
    fn merge(&mut self, other: DispatchStats) {
        self.outcomes += other.outcomes;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.unresolved_targets += other.unresolved_targets;
        self.empty_audiences += other.empty_audiences;
    }
}

/// Producer side of the dispatch queue. Publishing never waits.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<TransitionOutcome>,
}

impl DispatcherHandle {
    pub fn publish(&self, outcome: TransitionOutcome) -> Result<(), DispatchError> {
        self.sender.try_send(outcome).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::QueueClosed,
        })
    }
}

pub struct NotificationDispatcher {
    audience: Arc<dyn AudienceResolver>,
    sink: Arc<dyn NotificationSink>,
    retry: DeliveryRetryHandler,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(audience: Arc<dyn AudienceResolver>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            audience,
            sink,
            retry: DeliveryRetryHandler::default(),
        }
    }

    pub fn with_retry(mut self, retry: DeliveryRetryHandler) -> Self {
        self.retry = retry;
        self
    }

    /// Starts the consumer task. It stops once every handle is dropped and the
    /// queue is drained, returning what it dispatched.
    pub fn spawn(self, capacity: usize) -> (DispatcherHandle, JoinHandle<DispatchStats>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(receiver));
        (DispatcherHandle { sender }, task)
    }

    async fn run(self, mut receiver: mpsc::Receiver<TransitionOutcome>) -> DispatchStats {
        info!("Notification dispatcher started");
        let mut stats = DispatchStats::default();
        while let Some(outcome) = receiver.recv().await {
            stats.merge(self.dispatch(&outcome).await);
        }
        info!(
            outcomes = stats.outcomes,
            delivered = stats.delivered,
            failed = stats.failed,
            "Notification dispatcher stopped"
        );
        stats
    }

    /// Announces one outcome. Failures are logged and counted, never returned.
    pub async fn dispatch(&self, outcome: &TransitionOutcome) -> DispatchStats {
        let dossier = outcome.dossier();
        let span = tracing::info_span!(
            "notification_dispatch",
            dossier.id = %dossier.id,
            dossier.case_number = %dossier.case_number,
            outcome = outcome.label(),
        );
        self.dispatch_inner(outcome).instrument(span).await
    }

    async fn dispatch_inner(&self, outcome: &TransitionOutcome) -> DispatchStats {
        let metrics = workflow_metrics();
        let mut stats = DispatchStats {
            outcomes: 1,
            ..Default::default()
        };

        for plan in plan_notifications(outcome) {
            let recipients = match &plan.target {
                AudienceTarget::User(user) => Ok(vec![user.clone()]),
                AudienceTarget::Role(role) => {
                    let role = *role;
                    self.retry
                        .execute_with_retry("resolve_audience", || self.audience.users_with_role(role))
                        .await
                }
            };

            let recipients = match recipients {
                Ok(users) => users,
                Err(e) => {
                    error!(target_audience = ?plan.target, error = %e, "Could not resolve notification audience");
                    stats.unresolved_targets += 1;
                    metrics.record_notification_failed();
                    continue;
                }
            };

            if recipients.is_empty() {
                warn!(
                    target_audience = ?plan.target,
                    notification_type = %plan.notification_type,
                    "Nobody holds the target role, notification not sent"
                );
                stats.empty_audiences += 1;
                continue;
            }

            for recipient in recipients {
                let notification = plan.render(&recipient, Utc::now());
                match self
                    .retry
                    .execute_with_retry("deliver_notification", || self.sink.deliver(&notification))
                    .await
                {
                    Ok(()) => {
                        stats.delivered += 1;
                        metrics.record_notification_delivered();
                    }
                    Err(e) => {
                        error!(
                            recipient = %recipient,
                            notification_type = %notification.notification_type,
                            error = %e,
                            "Notification delivery failed permanently"
                        );
                        stats.failed += 1;
                        metrics.record_notification_failed();
                    }
                }
            }
        }

        stats
    }
}
