// Workflow engine - orchestrates checklist submission across the approval chain
//
// Flow per submission: lock dossier -> load -> precondition -> catalog ->
// record answers -> aggregate -> transition -> atomic commit -> announce.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::errors::WorkflowError;
use super::locks::DossierLocks;
use super::request::{
    parse_submission, ChecklistSubmission, ItemResult, ReadCheckpointRequest, SubmissionReceipt,
    SubmissionStatus,
};
use super::state_machine::{DossierStateMachine, WorkflowEvent};
use crate::checklist::{
    rejection_reason, ActiveCatalog, CatalogCategory, ChecklistCatalog, ChecklistCategory,
    ChecklistItem, ChecklistValidation, Synthesis, ValidationRecorder, ValidationSynthesis, Verdict,
};
use crate::dossier::{Checkpoint, Dossier, DossierId, DossierStatus, NewDossier, RejectionRecord, UserId};
use crate::notifications::{DispatcherHandle, DossierSnapshot, TransitionOutcome};
use crate::observability::{create_workflow_span, workflow_metrics, OperationTimer};
use crate::store::{CheckpointCommit, ResubmissionCommit, WorkflowStore};
use crate::telemetry::{create_submission_span, generate_correlation_id};

/// A catalog item joined with the answer recorded for it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredItem {
    #[serde(flatten)]
    pub item: ChecklistItem,
    pub answer: Option<ChecklistValidation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResults {
    #[serde(flatten)]
    pub category: ChecklistCategory,
    pub items: Vec<AnsweredItem>,
}

/// Read model of one checkpoint of one dossier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistResults {
    pub dossier_id: DossierId,
    pub checkpoint: Checkpoint,
    pub dossier_status: DossierStatus,
    pub categories: Vec<CategoryResults>,
    /// Every stored answer, including answers to items deactivated since.
    pub answers: Vec<ChecklistValidation>,
    pub synthesis: Option<ValidationSynthesis>,
}

/// Synthesis trail read by the quitus compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHistory {
    pub dossier_id: DossierId,
    pub case_number: String,
    pub status: DossierStatus,
    pub syntheses: Vec<ValidationSynthesis>,
    pub quitus_ready: bool,
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    catalog: ChecklistCatalog,
    recorder: ValidationRecorder,
    locks: DossierLocks,
    dispatcher: Option<DispatcherHandle>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("tracked_locks", &self.locks.tracked())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            catalog: ChecklistCatalog::new(store.clone()),
            store,
            recorder: ValidationRecorder::new(),
            locks: DossierLocks::new(),
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherHandle) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn catalog(&self) -> &ChecklistCatalog {
        &self.catalog
    }

    /// Opens a dossier in PENDING.
    pub async fn create_dossier(&self, new_dossier: NewDossier) -> Result<Dossier, WorkflowError> {
        let problems = new_dossier.validate();
        if !problems.is_empty() {
            return Err(WorkflowError::InvalidRequest { details: problems });
        }

        let dossier = new_dossier.into_dossier(Utc::now());
        self.store.insert_dossier(&dossier).await?;
        info!(
            dossier_id = %dossier.id,
            case_number = %dossier.case_number,
            creator_id = %dossier.creator_id,
            "Dossier created"
        );
        Ok(dossier)
    }

    pub async fn dossier(&self, id: DossierId) -> Result<Dossier, WorkflowError> {
        self.store
            .load_dossier(id)
            .await?
            .ok_or_else(|| WorkflowError::dossier_not_found(id))
    }

    pub async fn list_active_categories(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<Vec<CatalogCategory>, WorkflowError> {
        self.catalog.list_active_categories(checkpoint).await
    }

    /// Decodes a JSON submit request, then submits it.
    pub async fn submit_request(&self, json: &str) -> Result<SubmissionReceipt, WorkflowError> {
        let submission = match parse_submission(json) {
            Ok(submission) => submission,
            Err(e) => {
                workflow_metrics().record_validation_failure();
                warn!(error = %e, "Rejected malformed checklist submission");
                return Err(e);
            }
        };
        self.submit_checklist(submission).await
    }

    /// Records a full checklist for one checkpoint and moves the dossier on.
    ///
    /// Validation failures leave the dossier untouched. Once the commit succeeds
    /// the outcome is announced best-effort; nothing about the announcement can
    /// change the returned receipt.
    pub async fn submit_checklist(
        &self,
        submission: ChecklistSubmission,
    ) -> Result<SubmissionReceipt, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_submission_span(
            submission.dossier_id,
            submission.checkpoint,
            submission.actor_id.as_str(),
            &correlation_id,
        );
        let metrics = workflow_metrics();
        metrics.record_submission();
        let timer = OperationTimer::new("submit_checklist");

        let result = self.submit_locked(submission).instrument(span.clone()).await;
        let _entered = span.enter();
        match &result {
            Ok(receipt) => {
                span.record("verdict", receipt.synthesis.verdict.as_str());
                match receipt.synthesis.verdict {
                    Verdict::Valid => metrics.record_approval(),
                    Verdict::Rejected => metrics.record_rejection(),
                }
            }
            Err(e) if e.is_validation() => {
                metrics.record_validation_failure();
                warn!(kind = e.kind(), error = %e, "Checklist submission refused");
            }
            Err(e @ WorkflowError::ConcurrentModification { .. }) => {
                metrics.record_conflict();
                warn!(error = %e, "Checklist submission lost a concurrent update");
            }
            Err(e) => warn!(kind = e.kind(), error = %e, "Checklist submission failed"),
        }
        timer.finish();
        result
    }

    async fn submit_locked(
        &self,
        submission: ChecklistSubmission,
    ) -> Result<SubmissionReceipt, WorkflowError> {
        let ChecklistSubmission {
            dossier_id,
            checkpoint,
            answers,
            actor_id,
            general_comment,
        } = submission;

        let _guard = self.locks.acquire(dossier_id).await;
        let dossier = self.dossier(dossier_id).await?;

        let mut machine = DossierStateMachine::resume(dossier.status);
        if machine.submittable_checkpoint() != Some(checkpoint) {
            return Err(precondition_failure(&dossier, checkpoint));
        }

        let catalog = self.catalog.load_for_submission(checkpoint).await?;
        let now = Utc::now();
        let validations = self
            .recorder
            .prepare(&catalog, dossier_id, &answers, &actor_id, now)?;
        let synthesis = Synthesis::of_validations(&catalog, &validations);

        let transition = machine
            .handle_event(WorkflowEvent::CheckpointDecided {
                checkpoint,
                verdict: synthesis.verdict,
            })
            .map_err(|e| WorkflowError::precondition(e.to_string()))?;

        let rejection = (!synthesis.is_valid()).then(|| RejectionRecord {
            checkpoint,
            reason: rejection_reason(&catalog, &validations),
            detail: general_comment.clone(),
            rejected_at: now,
        });
        let recorded = ValidationSynthesis::record(
            dossier_id,
            checkpoint,
            synthesis,
            general_comment,
            actor_id,
            now,
        );
        let per_item = item_results(&catalog, &validations);

        let updated = self
            .store
            .commit_checkpoint(CheckpointCommit {
                dossier_id,
                expected_version: dossier.version,
                checkpoint,
                validations,
                synthesis: recorded.clone(),
                new_status: transition.to_state,
                rejection: rejection.clone(),
                committed_at: now,
            })
            .await?;

        info!(
            dossier_id = %dossier_id,
            checkpoint = %checkpoint,
            verdict = synthesis.verdict.as_str(),
            validated = synthesis.validated,
            rejected = synthesis.rejected,
            from_status = %transition.from_state,
            to_status = %updated.status,
            "Checkpoint decided"
        );

        let snapshot = DossierSnapshot::from(&updated);
        let outcome = match (synthesis.verdict, rejection) {
            (Verdict::Rejected, Some(rejection)) => TransitionOutcome::Rejected {
                dossier: snapshot,
                checkpoint,
                reason: rejection.reason,
                detail: rejection.detail,
                synthesis,
            },
            _ => match checkpoint.next() {
                Some(next) => TransitionOutcome::Advanced {
                    dossier: snapshot,
                    checkpoint,
                    next,
                    synthesis,
                },
                None => TransitionOutcome::Finalized {
                    dossier: snapshot,
                    synthesis,
                },
            },
        };
        self.announce(outcome);

        Ok(SubmissionReceipt {
            status: SubmissionStatus::from(synthesis.verdict),
            dossier_status: updated.status,
            synthesis,
            per_item,
            recorded,
        })
    }

    /// Catalog of `checkpoint` joined with the answers stored for the dossier.
    pub async fn get_checklist_results(
        &self,
        dossier_id: DossierId,
        checkpoint: Checkpoint,
    ) -> Result<ChecklistResults, WorkflowError> {
        let dossier = self.dossier(dossier_id).await?;
        let catalog = self.catalog.active_catalog(checkpoint).await?;
        let answers = self.store.load_validations(dossier_id, checkpoint).await?;
        let synthesis = self.store.load_synthesis(dossier_id, checkpoint).await?;

        let categories = catalog
            .categories
            .into_iter()
            .map(|group| CategoryResults {
                items: group
                    .items
                    .into_iter()
                    .map(|item| AnsweredItem {
                        answer: answers.iter().find(|a| a.item_id == item.id).cloned(),
                        item,
                    })
                    .collect(),
                category: group.category,
            })
            .collect();

        debug!(
            dossier_id = %dossier_id,
            checkpoint = %checkpoint,
            answers = answers.len(),
            has_synthesis = synthesis.is_some(),
            "Read checklist results"
        );
        Ok(ChecklistResults {
            dossier_id,
            checkpoint,
            dossier_status: dossier.status,
            categories,
            answers,
            synthesis,
        })
    }

    pub async fn read_checkpoint(
        &self,
        request: ReadCheckpointRequest,
    ) -> Result<ChecklistResults, WorkflowError> {
        let (dossier_id, checkpoint) = request.parse()?;
        self.get_checklist_results(dossier_id, checkpoint).await
    }

    /// Sends a rejected dossier back to the checkpoint that rejected it.
    /// Only the creator may do this. Stored answers stay until the next submission.
    pub async fn resubmit(
        &self,
        dossier_id: DossierId,
        actor_id: &UserId,
        comment: Option<String>,
    ) -> Result<Dossier, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("resubmit", &correlation_id);
        self.resubmit_locked(dossier_id, actor_id, comment)
            .instrument(span)
            .await
    }

    async fn resubmit_locked(
        &self,
        dossier_id: DossierId,
        actor_id: &UserId,
        comment: Option<String>,
    ) -> Result<Dossier, WorkflowError> {
        let _guard = self.locks.acquire(dossier_id).await;
        let dossier = self.dossier(dossier_id).await?;

        if &dossier.creator_id != actor_id {
            return Err(WorkflowError::PreconditionFailed {
                reason: "only the dossier creator may resubmit".to_string(),
                details: vec![format!(
                    "{} is not the creator of dossier {}",
                    actor_id, dossier.case_number
                )],
            });
        }

        let checkpoint = dossier.status.rejected_at().ok_or_else(|| {
            WorkflowError::PreconditionFailed {
                reason: format!("dossier {} is not rejected", dossier.case_number),
                details: vec![format!("current status is {}", dossier.status)],
            }
        })?;

        let mut machine = DossierStateMachine::resume(dossier.status);
        let transition = machine
            .handle_event(WorkflowEvent::Resubmitted)
            .map_err(|e| WorkflowError::precondition(e.to_string()))?;

        let updated = self
            .store
            .commit_resubmission(ResubmissionCommit {
                dossier_id,
                expected_version: dossier.version,
                new_status: transition.to_state,
                committed_at: Utc::now(),
            })
            .await?;

        info!(
            dossier_id = %dossier_id,
            checkpoint = %checkpoint,
            to_status = %updated.status,
            "Dossier resubmitted"
        );
        workflow_metrics().record_resubmission();

        self.announce(TransitionOutcome::Reopened {
            dossier: DossierSnapshot::from(&updated),
            checkpoint,
            comment: comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        });
        Ok(updated)
    }

    /// Every stored synthesis for the dossier, in checkpoint order.
    pub async fn checkpoint_history(
        &self,
        dossier_id: DossierId,
    ) -> Result<CheckpointHistory, WorkflowError> {
        let dossier = self.dossier(dossier_id).await?;
        let syntheses = self.store.load_syntheses(dossier_id).await?;
        let quitus_ready = dossier.status == DossierStatus::Finalized
            && Checkpoint::ALL.into_iter().all(|cp| {
                syntheses
                    .iter()
                    .any(|s| s.checkpoint == cp && s.verdict == Verdict::Valid)
            });

        Ok(CheckpointHistory {
            dossier_id,
            case_number: dossier.case_number,
            status: dossier.status,
            syntheses,
            quitus_ready,
        })
    }

    fn announce(&self, outcome: TransitionOutcome) {
        let Some(dispatcher) = &self.dispatcher else {
            debug!(outcome = outcome.label(), "No dispatcher attached, outcome not announced");
            return;
        };
        let label = outcome.label();
        if let Err(e) = dispatcher.publish(outcome) {
            workflow_metrics().record_notification_dropped();
            warn!(outcome = label, error = %e, "Transition announcement dropped");
        }
    }
}

fn precondition_failure(dossier: &Dossier, checkpoint: Checkpoint) -> WorkflowError {
    let mut details = vec![format!(
        "{} requires status {}, dossier {} is {}",
        checkpoint,
        checkpoint.precondition(),
        dossier.case_number,
        dossier.status
    )];
    if let Some(rejected) = dossier.status.rejected_at() {
        details.push(format!(
            "dossier was rejected at {rejected}; the creator must resubmit it first"
        ));
    }
    WorkflowError::PreconditionFailed {
        reason: format!("{} cannot be submitted for {}", checkpoint, dossier.case_number),
        details,
    }
}

fn item_results(catalog: &ActiveCatalog, validations: &[ChecklistValidation]) -> Vec<ItemResult> {
    catalog
        .categories
        .iter()
        .flat_map(|group| {
            group.items.iter().filter_map(move |item| {
                let answer = validations.iter().find(|v| v.item_id == item.id)?;
                Some(ItemResult {
                    item_id: item.id,
                    name: item.name.clone(),
                    category: group.category.name.clone(),
                    mandatory: item.mandatory,
                    valid: answer.valid,
                    comment: answer.comment.clone(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ChecklistAnswer;
    use crate::store::{InMemoryStore, ReferenceData};

    async fn engine_with_catalog() -> (WorkflowEngine, Dossier) {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_category(ChecklistCategory {
                id: 1,
                checkpoint: Checkpoint::BudgetControl,
                name: "Supporting documents".to_string(),
                display_order: 1,
                active: true,
            })
            .await
            .unwrap();
        for (id, mandatory) in [(10, true), (11, true), (12, false)] {
            store
                .put_item(ChecklistItem {
                    id,
                    category_id: 1,
                    name: format!("Control {id}"),
                    mandatory,
                    display_order: id as i32,
                    active: true,
                })
                .await
                .unwrap();
        }

        let engine = WorkflowEngine::new(store);
        let dossier = engine
            .create_dossier(NewDossier {
                case_number: "DOS-2026-0001".to_string(),
                amount: 125_000,
                creator_id: UserId::new("originator-1"),
                nature_id: None,
                budget_line_id: Some(4),
            })
            .await
            .unwrap();
        (engine, dossier)
    }

    fn submission(dossier: &Dossier, answers: Vec<ChecklistAnswer>) -> ChecklistSubmission {
        ChecklistSubmission {
            dossier_id: dossier.id,
            checkpoint: Checkpoint::BudgetControl,
            answers,
            actor_id: UserId::new("controller-1"),
            general_comment: Some("Reviewed".to_string()),
        }
    }

    #[tokio::test]
    async fn test_positive_submission_advances_dossier() {
        let (engine, dossier) = engine_with_catalog().await;
        let receipt = engine
            .submit_checklist(submission(
                &dossier,
                vec![ChecklistAnswer::valid(10), ChecklistAnswer::valid(11)],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.status, SubmissionStatus::Approved);
        assert_eq!(receipt.dossier_status, DossierStatus::ApprovedCheckpoint1);
        assert_eq!(receipt.per_item.len(), 2);
        assert_eq!(receipt.per_item[0].category, "Supporting documents");

        let stored = engine.dossier(dossier.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert!(stored.last_transition_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_mandatory_item_leaves_dossier_untouched() {
        let (engine, dossier) = engine_with_catalog().await;
        let err = engine
            .submit_checklist(submission(&dossier, vec![ChecklistAnswer::valid(10)]))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::MissingRequiredItem { ref items, .. } if items[0].id == 11));
        let stored = engine.dossier(dossier.id).await.unwrap();
        assert_eq!(stored.status, DossierStatus::Pending);
        assert_eq!(stored.version, 0);
        let results = engine
            .get_checklist_results(dossier.id, Checkpoint::BudgetControl)
            .await
            .unwrap();
        assert!(results.answers.is_empty());
        assert!(results.synthesis.is_none());
    }

    #[tokio::test]
    async fn test_rejection_records_reason_and_detail() {
        let (engine, dossier) = engine_with_catalog().await;
        engine
            .submit_checklist(submission(
                &dossier,
                vec![
                    ChecklistAnswer::valid(10),
                    ChecklistAnswer::invalid(11, "amount mismatch"),
                ],
            ))
            .await
            .unwrap();

        let stored = engine.dossier(dossier.id).await.unwrap();
        assert_eq!(stored.status, DossierStatus::RejectedCheckpoint1);
        let rejection = stored.rejection.unwrap();
        assert!(rejection.reason.contains("Control 11 (amount mismatch)"));
        assert_eq!(rejection.detail.as_deref(), Some("Reviewed"));
    }

    #[tokio::test]
    async fn test_invalid_new_dossier_is_refused() {
        let (engine, _) = engine_with_catalog().await;
        let err = engine
            .create_dossier(NewDossier {
                case_number: "dos-1".to_string(),
                amount: -5,
                creator_id: UserId::new("originator-1"),
                nature_id: None,
                budget_line_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.details().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_dossier_is_not_found() {
        let (engine, _) = engine_with_catalog().await;
        let err = engine
            .get_checklist_results(DossierId::new(), Checkpoint::BudgetControl)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
