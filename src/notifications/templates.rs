// Notification templates: what to say, to whom, for each transition outcome

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use super::types::{
    DossierSnapshot, Notification, NotificationPriority, NotificationType, TransitionOutcome,
};
use crate::checklist::Synthesis;
use crate::dossier::{Checkpoint, Role, UserId};

/// Who a planned notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceTarget {
    /// Every user holding the role, resolved at dispatch time.
    Role(Role),
    User(UserId),
}

/// A notification waiting for its recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPlan {
    pub target: AudienceTarget,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub action_ref: Option<String>,
    pub metadata: serde_json::Value,
}

impl NotificationPlan {
    pub fn render(&self, recipient: &UserId, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient: recipient.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            notification_type: self.notification_type,
            priority: self.priority,
            read: false,
            read_at: None,
            action_ref: self.action_ref.clone(),
            metadata: self.metadata.clone(),
            created_at: now,
        }
    }
}

fn metadata(dossier: &DossierSnapshot, checkpoint: Checkpoint, synthesis: Option<&Synthesis>) -> serde_json::Value {
    let mut value = json!({
        "dossier_id": dossier.id.to_string(),
        "case_number": dossier.case_number,
        "checkpoint": checkpoint.as_str(),
        "checkpoint_number": checkpoint.number(),
        "status": dossier.status.as_str(),
    });
    if let Some(s) = synthesis {
        value["synthesis"] = json!({
            "total": s.total,
            "validated": s.validated,
            "rejected": s.rejected,
            "verdict": s.verdict.as_str(),
        });
    }
    value
}

fn dossier_link(dossier: &DossierSnapshot) -> String {
    format!("/dossiers/{}", dossier.id)
}

/// Builds the notifications announcing `outcome`.
pub fn plan_notifications(outcome: &TransitionOutcome) -> Vec<NotificationPlan> {
    match outcome {
        TransitionOutcome::Advanced {
            dossier,
            checkpoint,
            next,
            synthesis,
        } => vec![
            NotificationPlan {
                target: AudienceTarget::Role(next.responsible_role()),
                notification_type: NotificationType::WorkflowActionRequired,
                priority: NotificationPriority::High,
                title: format!("Dossier {} awaits {} review", dossier.case_number, next),
                message: format!(
                    "Dossier {} passed {} ({}/{} controls validated) and is ready for the {} checklist.",
                    dossier.case_number, checkpoint, synthesis.validated, synthesis.total, next
                ),
                action_ref: Some(format!("{}/checkpoints/{}", dossier_link(dossier), next)),
                metadata: metadata(dossier, *next, Some(synthesis)),
            },
            NotificationPlan {
                target: AudienceTarget::User(dossier.creator_id.clone()),
                notification_type: NotificationType::WorkflowProgress,
                priority: NotificationPriority::Normal,
                title: format!("Dossier {} passed {}", dossier.case_number, checkpoint),
                message: format!(
                    "Your dossier {} was approved at {} and moved on to {}.",
                    dossier.case_number, checkpoint, next
                ),
                action_ref: Some(dossier_link(dossier)),
                metadata: metadata(dossier, *checkpoint, Some(synthesis)),
            },
        ],
        TransitionOutcome::Rejected {
            dossier,
            checkpoint,
            reason,
            detail,
            synthesis,
        } => {
            let mut message = format!(
                "Your dossier {} was rejected at {}. Reason: {}",
                dossier.case_number, checkpoint, reason
            );
            if let Some(detail) = detail {
                message.push_str(&format!("\nReviewer comment: {detail}"));
            }
            let mut meta = metadata(dossier, *checkpoint, Some(synthesis));
            meta["rejection_reason"] = json!(reason);
            vec![NotificationPlan {
                target: AudienceTarget::User(dossier.creator_id.clone()),
                notification_type: NotificationType::WorkflowRejected,
                priority: NotificationPriority::Urgent,
                title: format!("Dossier {} rejected at {}", dossier.case_number, checkpoint),
                message,
                action_ref: Some(format!("{}/resubmit", dossier_link(dossier))),
                metadata: meta,
            }]
        }
        TransitionOutcome::Finalized { dossier, synthesis } => vec![NotificationPlan {
            target: AudienceTarget::User(dossier.creator_id.clone()),
            notification_type: NotificationType::WorkflowFinalized,
            priority: NotificationPriority::Normal,
            title: format!("Dossier {} finalized", dossier.case_number),
            message: format!(
                "Your dossier {} passed every checkpoint and is finalized. The quitus can now be compiled.",
                dossier.case_number
            ),
            action_ref: Some(format!("{}/quitus", dossier_link(dossier))),
            metadata: metadata(dossier, Checkpoint::AccountingOfficer, Some(synthesis)),
        }],
        TransitionOutcome::Reopened {
            dossier,
            checkpoint,
            comment,
        } => {
            let mut message = format!(
                "Dossier {} was corrected and resubmitted for the {} checklist.",
                dossier.case_number, checkpoint
            );
            if let Some(comment) = comment {
                message.push_str(&format!("\nCreator comment: {comment}"));
            }
            vec![NotificationPlan {
                target: AudienceTarget::Role(checkpoint.responsible_role()),
                notification_type: NotificationType::WorkflowResubmitted,
                priority: NotificationPriority::High,
                title: format!("Dossier {} resubmitted", dossier.case_number),
                message,
                action_ref: Some(format!("{}/checkpoints/{}", dossier_link(dossier), checkpoint)),
                metadata: metadata(dossier, *checkpoint, None),
            }]
        }
    }
}
