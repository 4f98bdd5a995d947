// Validation Recorder - turns a submitted answer set into the rows that replace
// the stored answers of one (dossier, checkpoint)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::catalog::{ActiveCatalog, ItemId};
use crate::dossier::{Checkpoint, DossierId, UserId};
use crate::workflows::errors::{ItemRef, WorkflowError};

/// One answer as accepted at the boundary, before it is tied to a dossier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    pub item_id: ItemId,
    pub valid: bool,
    pub comment: Option<String>,
    pub evidence_ref: Option<String>,
}

impl ChecklistAnswer {
    pub fn valid(item_id: ItemId) -> Self {
        Self {
            item_id,
            valid: true,
            comment: None,
            evidence_ref: None,
        }
    }

    pub fn invalid(item_id: ItemId, comment: impl Into<String>) -> Self {
        Self {
            item_id,
            valid: false,
            comment: Some(comment.into()),
            evidence_ref: None,
        }
    }
}

/// A stored answer to one item for one dossier at one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistValidation {
    pub dossier_id: DossierId,
    pub checkpoint: Checkpoint,
    pub item_id: ItemId,
    pub valid: bool,
    pub comment: Option<String>,
    pub evidence_ref: Option<String>,
    pub actor_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ValidationRecorder;

impl ValidationRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Checks the answer set against the catalog and builds the replacement rows,
    /// ordered like the catalog. Nothing is persisted here.
    ///
    /// Checks run in this order, each reporting every offender it finds:
    /// unanswered mandatory items, unknown or inactive items, duplicated items.
    pub fn prepare(
        &self,
        catalog: &ActiveCatalog,
        dossier_id: DossierId,
        answers: &[ChecklistAnswer],
        actor_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ChecklistValidation>, WorkflowError> {
        let answered: HashSet<ItemId> = answers.iter().map(|a| a.item_id).collect();

        let missing: Vec<ItemRef> = catalog
            .mandatory_items()
            .filter(|item| !answered.contains(&item.id))
            .map(ItemRef::from)
            .collect();
        if !missing.is_empty() {
            return Err(WorkflowError::MissingRequiredItem {
                checkpoint: catalog.checkpoint,
                items: missing,
            });
        }

        let unknown: BTreeSet<ItemId> = answers
            .iter()
            .map(|a| a.item_id)
            .filter(|id| catalog.find_item(*id).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(WorkflowError::UnknownChecklistItem {
                checkpoint: catalog.checkpoint,
                items: unknown.into_iter().collect(),
            });
        }

        let mut seen: HashMap<ItemId, usize> = HashMap::new();
        for answer in answers {
            *seen.entry(answer.item_id).or_default() += 1;
        }
        let duplicated: BTreeSet<ItemId> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();
        if !duplicated.is_empty() {
            return Err(WorkflowError::DuplicateAnswer {
                items: duplicated.into_iter().collect(),
            });
        }

        let by_item: HashMap<ItemId, &ChecklistAnswer> =
            answers.iter().map(|a| (a.item_id, a)).collect();
        let validations = catalog
            .items()
            .filter_map(|item| by_item.get(&item.id))
            .map(|answer| ChecklistValidation {
                dossier_id,
                checkpoint: catalog.checkpoint,
                item_id: answer.item_id,
                valid: answer.valid,
                comment: answer.comment.clone(),
                evidence_ref: answer.evidence_ref.clone(),
                actor_id: actor_id.clone(),
                created_at: at,
            })
            .collect();

        Ok(validations)
    }
}
