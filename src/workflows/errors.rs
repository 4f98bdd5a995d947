use serde::Serialize;
use thiserror::Error;

use crate::checklist::{ChecklistItem, ItemId};
use crate::dossier::{Checkpoint, DossierId};
use crate::store::StoreError;

/// Catalog item named in an error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub id: ItemId,
    pub name: String,
}

impl From<&ChecklistItem> for ItemRef {
    fn from(item: &ChecklistItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
        }
    }
}

/// Errors returned by workflow operations.
///
/// Validation-class variants never leave partial state behind; persistence-class
/// variants mean the whole submission was not applied.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Precondition failed: {reason}")]
    PreconditionFailed { reason: String, details: Vec<String> },

    #[error("Missing {} mandatory checklist item(s) for {checkpoint}", items.len())]
    MissingRequiredItem {
        checkpoint: Checkpoint,
        items: Vec<ItemRef>,
    },

    #[error("Unknown or inactive checklist item(s) for {checkpoint}: {items:?}")]
    UnknownChecklistItem {
        checkpoint: Checkpoint,
        items: Vec<ItemId>,
    },

    #[error("Checklist item(s) answered more than once: {items:?}")]
    DuplicateAnswer { items: Vec<ItemId> },

    #[error("No active checklist items are configured for {checkpoint}")]
    EmptyCatalog { checkpoint: Checkpoint },

    #[error("Invalid request: {}", details.join("; "))]
    InvalidRequest { details: Vec<String> },

    #[error("Dossier {dossier_id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        dossier_id: DossierId,
        expected: i64,
        found: i64,
    },

    #[error("Persistence failure: {reason}")]
    PersistenceFailure { reason: String },
}

impl WorkflowError {
    pub fn dossier_not_found(id: DossierId) -> Self {
        WorkflowError::NotFound {
            entity: "dossier",
            id: id.to_string(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        WorkflowError::PreconditionFailed {
            reason: reason.into(),
            details: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::PreconditionFailed { .. } => "precondition_failed",
            WorkflowError::MissingRequiredItem { .. } => "missing_required_item",
            WorkflowError::UnknownChecklistItem { .. } => "unknown_checklist_item",
            WorkflowError::DuplicateAnswer { .. } => "duplicate_answer",
            WorkflowError::EmptyCatalog { .. } => "empty_catalog",
            WorkflowError::InvalidRequest { .. } => "invalid_request",
            WorkflowError::ConcurrentModification { .. } => "concurrent_modification",
            WorkflowError::PersistenceFailure { .. } => "persistence_failure",
        }
    }

    /// Errors the caller can fix by correcting the request and retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::PreconditionFailed { .. }
                | WorkflowError::MissingRequiredItem { .. }
                | WorkflowError::UnknownChecklistItem { .. }
                | WorkflowError::DuplicateAnswer { .. }
                | WorkflowError::EmptyCatalog { .. }
                | WorkflowError::InvalidRequest { .. }
        )
    }

    /// One line per offending element, suitable for display next to a form.
    pub fn details(&self) -> Vec<String> {
        match self {
            WorkflowError::MissingRequiredItem { items, .. } => items
                .iter()
                .map(|item| format!("item {}: '{}' is mandatory and unanswered", item.id, item.name))
                .collect(),
            WorkflowError::UnknownChecklistItem { items, .. } => items
                .iter()
                .map(|id| format!("item {id}: not an active item of this checklist"))
                .collect(),
            WorkflowError::DuplicateAnswer { items } => items
                .iter()
                .map(|id| format!("item {id}: answered more than once"))
                .collect(),
            WorkflowError::PreconditionFailed { reason, details } if details.is_empty() => {
                vec![reason.clone()]
            }
            WorkflowError::PreconditionFailed { details, .. }
            | WorkflowError::InvalidRequest { details } => details.clone(),
            other => vec![other.to_string()],
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Serializable form of a [`WorkflowError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    pub details: Vec<String>,
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DossierNotFound(id) => WorkflowError::dossier_not_found(id),
            StoreError::VersionConflict {
                dossier_id,
                expected,
                found,
            } => WorkflowError::ConcurrentModification {
                dossier_id,
                expected,
                found,
            },
            StoreError::Duplicate(what) => WorkflowError::PreconditionFailed {
                reason: "record already exists".to_string(),
                details: vec![what],
            },
            StoreError::Backend(reason) => WorkflowError::PersistenceFailure { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_items_are_enumerated_in_details() {
        let err = WorkflowError::MissingRequiredItem {
            checkpoint: Checkpoint::BudgetControl,
            items: vec![
                ItemRef { id: 1, name: "Invoice attached".to_string() },
                ItemRef { id: 4, name: "Budget line open".to_string() },
            ],
        };
        assert!(err.is_validation());
        let details = err.details();
        assert_eq!(details.len(), 2);
        assert!(details[1].contains("Budget line open"));
        assert_eq!(err.report().kind, "missing_required_item");
    }

    #[test]
    fn test_store_conflicts_map_to_concurrent_modification() {
        let id = DossierId::new();
        let err: WorkflowError = StoreError::VersionConflict {
            dossier_id: id,
            expected: 2,
            found: 3,
        }
        .into();
        assert!(matches!(err, WorkflowError::ConcurrentModification { expected: 2, found: 3, .. }));
        assert!(!err.is_validation());
    }
}
