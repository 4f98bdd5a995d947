use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::checklist::{ChecklistCategory, ChecklistItem};
use crate::dossier::{DossierId, NewDossier, Role, UserId};
use crate::store::{ReferenceData, WorkflowStore};
use crate::workflows::{ChecklistSubmission, SubmitChecklistRequest, WorkflowEngine, WorkflowError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleAssignment {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDossier {
    /// Fixed id so later commands can address the dossier
    #[serde(default)]
    pub id: Option<DossierId>,
    #[serde(flatten)]
    pub dossier: NewDossier,
}

/// Starting state for a CLI run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFixture {
    #[serde(default)]
    pub categories: Vec<ChecklistCategory>,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    #[serde(default)]
    pub dossiers: Vec<SeedDossier>,
    /// Replayed in order against dossiers created by this fixture
    #[serde(default)]
    pub submissions: Vec<SubmitChecklistRequest>,
}

impl SeedFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed fixture {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid seed fixture {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn apply_reference(&self, store: &dyn ReferenceData) -> Result<()> {
        for category in &self.categories {
            store.put_category(category.clone()).await?;
        }
        for item in &self.items {
            store.put_item(item.clone()).await?;
        }
        debug!(
            categories = self.categories.len(),
            items = self.items.len(),
            "Seeded checklist catalog"
        );
        Ok(())
    }

    /// Inserts missing dossiers, then replays the submissions that target them.
    /// Dossiers already present are left alone together with their submissions.
    pub async fn apply_workflow(
        &self,
        store: &dyn WorkflowStore,
        engine: &WorkflowEngine,
    ) -> Result<usize> {
        let mut created = HashSet::new();
        for seed in &self.dossiers {
            if let Some(id) = seed.id {
                if store.load_dossier(id).await?.is_some() {
                    debug!(dossier_id = %id, "Seed dossier already present");
                    continue;
                }
            }

            let problems = seed.dossier.validate();
            if !problems.is_empty() {
                return Err(WorkflowError::InvalidRequest { details: problems }.into());
            }
            let mut dossier = seed.dossier.clone().into_dossier(Utc::now());
            if let Some(id) = seed.id {
                dossier.id = id;
            }
            store
                .insert_dossier(&dossier)
                .await
                .map_err(WorkflowError::from)?;
            created.insert(dossier.id);
        }

        let mut replayed = 0;
        for request in &self.submissions {
            let submission = ChecklistSubmission::try_from(request.clone())?;
            if !created.contains(&submission.dossier_id) {
                continue;
            }
            engine.submit_checklist(submission).await.with_context(|| {
                format!("Seed submission for dossier {} failed", request.dossier_id)
            })?;
            replayed += 1;
        }

        info!(dossiers = created.len(), submissions = replayed, "Seed fixture applied");
        Ok(created.len())
    }
}
