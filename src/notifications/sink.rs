use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::types::{DispatchError, Notification};
use crate::dossier::UserId;

/// Where rendered notifications are handed over to the notification service.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Keeps delivered notifications in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }

    pub async fn for_recipient(&self, recipient: &UserId) -> Vec<Notification> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|n| &n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DispatchError> {
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Emits notifications as structured log events only.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DispatchError> {
        info!(
            notification_id = %notification.id,
            recipient = %notification.recipient,
            notification_type = %notification.notification_type,
            priority = notification.priority.as_str(),
            action_ref = ?notification.action_ref,
            title = %notification.title,
            "Notification emitted"
        );
        Ok(())
    }
}
