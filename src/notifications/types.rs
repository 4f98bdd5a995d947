use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::checklist::Synthesis;
use crate::dossier::{Checkpoint, Dossier, DossierId, DossierStatus, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    WorkflowActionRequired,
    WorkflowProgress,
    WorkflowRejected,
    WorkflowFinalized,
    WorkflowResubmitted,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::WorkflowActionRequired => "workflow_action_required",
            NotificationType::WorkflowProgress => "workflow_progress",
            NotificationType::WorkflowRejected => "workflow_rejected",
            NotificationType::WorkflowFinalized => "workflow_finalized",
            NotificationType::WorkflowResubmitted => "workflow_resubmitted",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

/// An append-only message for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub action_ref: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The dossier fields a notification needs, captured at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DossierSnapshot {
    pub id: DossierId,
    pub case_number: String,
    pub creator_id: UserId,
    pub status: DossierStatus,
    pub amount: i64,
}

impl From<&Dossier> for DossierSnapshot {
    fn from(dossier: &Dossier) -> Self {
        Self {
            id: dossier.id,
            case_number: dossier.case_number.clone(),
            creator_id: dossier.creator_id.clone(),
            status: dossier.status,
            amount: dossier.amount,
        }
    }
}

/// A committed transition, as announced to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    Advanced {
        dossier: DossierSnapshot,
        checkpoint: Checkpoint,
        next: Checkpoint,
        synthesis: Synthesis,
    },
    Rejected {
        dossier: DossierSnapshot,
        checkpoint: Checkpoint,
        reason: String,
        detail: Option<String>,
        synthesis: Synthesis,
    },
    Finalized {
        dossier: DossierSnapshot,
        synthesis: Synthesis,
    },
    Reopened {
        dossier: DossierSnapshot,
        checkpoint: Checkpoint,
        comment: Option<String>,
    },
}

impl TransitionOutcome {
    pub fn dossier(&self) -> &DossierSnapshot {
        match self {
            TransitionOutcome::Advanced { dossier, .. }
            | TransitionOutcome::Rejected { dossier, .. }
            | TransitionOutcome::Finalized { dossier, .. }
            | TransitionOutcome::Reopened { dossier, .. } => dossier,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransitionOutcome::Advanced { .. } => "advanced",
            TransitionOutcome::Rejected { .. } => "rejected",
            TransitionOutcome::Finalized { .. } => "finalized",
            TransitionOutcome::Reopened { .. } => "reopened",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Audience resolution failed: {0}")]
    Audience(String),

    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: UserId, reason: String },

    #[error("Delivery refused permanently: {0}")]
    Permanent(String),

    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,
}

impl DispatchError {
    /// Whether trying the same delivery again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Audience(_) | DispatchError::Delivery { .. })
    }
}
