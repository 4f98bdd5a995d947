use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CheckpointCommit, ReferenceData, ResubmissionCommit, StoreError, WorkflowStore};
use crate::checklist::{
    CategoryId, ChecklistCategory, ChecklistItem, ChecklistValidation, ItemId, ValidationSynthesis,
};
use crate::dossier::{Checkpoint, Dossier, DossierId};

#[derive(Debug, Default)]
struct MemoryState {
    dossiers: HashMap<DossierId, Dossier>,
    categories: BTreeMap<CategoryId, ChecklistCategory>,
    items: BTreeMap<ItemId, ChecklistItem>,
    validations: HashMap<(DossierId, Checkpoint), Vec<ChecklistValidation>>,
    syntheses: BTreeMap<(DossierId, Checkpoint), ValidationSynthesis>,
}

/// Process-local store. A commit validates and applies every write inside one
/// write-lock critical section, so readers never observe a torn transition.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_version(dossier: &Dossier, expected: i64) -> Result<(), StoreError> {
        if dossier.version != expected {
            return Err(StoreError::VersionConflict {
                dossier_id: dossier.id,
                expected,
                found: dossier.version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn insert_dossier(&self, dossier: &Dossier) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.dossiers.contains_key(&dossier.id) {
            return Err(StoreError::Duplicate(format!("dossier id {}", dossier.id)));
        }
        if state
            .dossiers
            .values()
            .any(|existing| existing.case_number == dossier.case_number)
        {
            return Err(StoreError::Duplicate(format!(
                "case number {}",
                dossier.case_number
            )));
        }
        state.dossiers.insert(dossier.id, dossier.clone());
        Ok(())
    }

    async fn load_dossier(&self, id: DossierId) -> Result<Option<Dossier>, StoreError> {
        Ok(self.state.read().await.dossiers.get(&id).cloned())
    }

    async fn catalog_rows(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<(Vec<ChecklistCategory>, Vec<ChecklistItem>), StoreError> {
        let state = self.state.read().await;
        let categories: Vec<ChecklistCategory> = state
            .categories
            .values()
            .filter(|c| c.checkpoint == checkpoint)
            .cloned()
            .collect();
        let items = state
            .items
            .values()
            .filter(|i| categories.iter().any(|c| c.id == i.category_id))
            .cloned()
            .collect();
        Ok((categories, items))
    }

    async fn load_validations(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Vec<ChecklistValidation>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .validations
            .get(&(id, checkpoint))
            .cloned()
            .unwrap_or_default())
    }

    async fn load_synthesis(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Option<ValidationSynthesis>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .syntheses
            .get(&(id, checkpoint))
            .cloned())
    }

    async fn load_syntheses(&self, id: DossierId) -> Result<Vec<ValidationSynthesis>, StoreError> {
        let state = self.state.read().await;
        Ok(Checkpoint::ALL
            .into_iter()
            .filter_map(|cp| state.syntheses.get(&(id, cp)).cloned())
            .collect())
    }

    async fn commit_checkpoint(&self, commit: CheckpointCommit) -> Result<Dossier, StoreError> {
        let mut state = self.state.write().await;

        let dossier = state
            .dossiers
            .get(&commit.dossier_id)
            .ok_or(StoreError::DossierNotFound(commit.dossier_id))?;
        Self::check_version(dossier, commit.expected_version)?;

        // Nothing below can fail, the critical section applies all or nothing.
        let key = (commit.dossier_id, commit.checkpoint);
        state.validations.insert(key, commit.validations);
        state.syntheses.insert(key, commit.synthesis);

        let dossier = state
            .dossiers
            .get_mut(&commit.dossier_id)
            .ok_or(StoreError::DossierNotFound(commit.dossier_id))?;
        dossier.status = commit.new_status;
        if commit.rejection.is_some() {
            dossier.rejection = commit.rejection;
        }
        dossier.version += 1;
        dossier.updated_at = commit.committed_at;
        dossier.last_transition_at = Some(commit.committed_at);

        debug!(
            dossier_id = %dossier.id,
            checkpoint = %commit.checkpoint,
            status = %dossier.status,
            version = dossier.version,
            "Committed checkpoint in memory"
        );
        Ok(dossier.clone())
    }

    async fn commit_resubmission(&self, commit: ResubmissionCommit) -> Result<Dossier, StoreError> {
        let mut state = self.state.write().await;
        let dossier = state
            .dossiers
            .get_mut(&commit.dossier_id)
            .ok_or(StoreError::DossierNotFound(commit.dossier_id))?;
        Self::check_version(dossier, commit.expected_version)?;

        dossier.status = commit.new_status;
        dossier.rejection = None;
        dossier.version += 1;
        dossier.updated_at = commit.committed_at;
        dossier.last_transition_at = Some(commit.committed_at);
        Ok(dossier.clone())
    }
}

#[async_trait]
impl ReferenceData for InMemoryStore {
    async fn put_category(&self, category: ChecklistCategory) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .categories
            .insert(category.id, category);
        Ok(())
    }

    async fn put_item(&self, item: ChecklistItem) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&item.category_id) {
            return Err(StoreError::Backend(format!(
                "item {} references unknown category {}",
                item.id, item.category_id
            )));
        }
        state.items.insert(item.id, item);
        Ok(())
    }
}
