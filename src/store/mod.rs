// Persistence seam for the workflow. Every state-changing operation goes through
// one commit call so the store can apply it all-or-nothing.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::checklist::{ChecklistCategory, ChecklistItem, ChecklistValidation, ValidationSynthesis};
use crate::dossier::{Checkpoint, Dossier, DossierId, DossierStatus, RejectionRecord};

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dossier {0} not found")]
    DossierNotFound(DossierId),

    #[error("version conflict on dossier {dossier_id}: expected {expected}, found {found}")]
    VersionConflict {
        dossier_id: DossierId,
        expected: i64,
        found: i64,
    },

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Everything one checkpoint submission writes. Applied atomically: either the
/// answers, the synthesis and the status all change, or none of them do.
#[derive(Debug, Clone)]
pub struct CheckpointCommit {
    pub dossier_id: DossierId,
    /// Version read before validation; the commit fails if it moved.
    pub expected_version: i64,
    pub checkpoint: Checkpoint,
    pub validations: Vec<ChecklistValidation>,
    pub synthesis: ValidationSynthesis,
    pub new_status: DossierStatus,
    pub rejection: Option<RejectionRecord>,
    pub committed_at: DateTime<Utc>,
}

/// Status reset performed when the creator resubmits a rejected dossier.
#[derive(Debug, Clone)]
pub struct ResubmissionCommit {
    pub dossier_id: DossierId,
    pub expected_version: i64,
    pub new_status: DossierStatus,
    pub committed_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert_dossier(&self, dossier: &Dossier) -> Result<(), StoreError>;

    async fn load_dossier(&self, id: DossierId) -> Result<Option<Dossier>, StoreError>;

    /// Raw category and item rows of one checkpoint, active or not.
    async fn catalog_rows(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<(Vec<ChecklistCategory>, Vec<ChecklistItem>), StoreError>;

    async fn load_validations(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Vec<ChecklistValidation>, StoreError>;

    async fn load_synthesis(
        &self,
        id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<Option<ValidationSynthesis>, StoreError>;

    /// All stored syntheses of a dossier, ordered by checkpoint.
    async fn load_syntheses(&self, id: DossierId) -> Result<Vec<ValidationSynthesis>, StoreError>;

    /// Replaces answers, upserts the synthesis and moves the status in one unit.
    async fn commit_checkpoint(&self, commit: CheckpointCommit) -> Result<Dossier, StoreError>;

    async fn commit_resubmission(&self, commit: ResubmissionCommit) -> Result<Dossier, StoreError>;
}

/// Catalog administration hooks. The workflow itself only reads the catalog;
/// these exist for seeding and for the external administration process.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn put_category(&self, category: ChecklistCategory) -> Result<(), StoreError>;

    async fn put_item(&self, item: ChecklistItem) -> Result<(), StoreError>;
}
