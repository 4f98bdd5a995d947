//! End-to-end workflow scenarios against the in-memory store.

mod fixtures;

use dossier_flow::checklist::{ChecklistAnswer, Verdict};
use dossier_flow::dossier::{Checkpoint, DossierId, DossierStatus, UserId};
use dossier_flow::store::{InMemoryStore, WorkflowStore};
use dossier_flow::workflows::{
    ChecklistSubmission, ReadCheckpointRequest, SubmissionStatus, WorkflowEngine, WorkflowError,
};
use fixtures::*;
use std::sync::Arc;

#[tokio::test]
async fn test_dossier_passes_every_checkpoint() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0100").await;

    let expected = [
        DossierStatus::ApprovedCheckpoint1,
        DossierStatus::ApprovedCheckpoint2,
        DossierStatus::Finalized,
    ];
    for (checkpoint, status) in Checkpoint::ALL.into_iter().zip(expected) {
        let receipt = engine
            .submit_checklist(submission(&dossier, checkpoint, all_valid(checkpoint)))
            .await
            .unwrap();
        assert_eq!(receipt.status, SubmissionStatus::Approved);
        assert_eq!(receipt.dossier_status, status);
        assert_eq!(receipt.synthesis.total, 3);
        assert_eq!(receipt.synthesis.validated, 3);
        assert_eq!(receipt.recorded.actor_id, actor_for(checkpoint));
    }

    let stored = engine.dossier(dossier.id).await.unwrap();
    assert_eq!(stored.status, DossierStatus::Finalized);
    assert_eq!(stored.version, 3);
    assert!(stored.rejection.is_none());

    let history = engine.checkpoint_history(dossier.id).await.unwrap();
    assert!(history.quitus_ready);
    assert_eq!(history.syntheses.len(), 3);
    assert!(history.syntheses.iter().all(|s| s.verdict == Verdict::Valid));
    assert_eq!(
        history.syntheses.iter().map(|s| s.checkpoint).collect::<Vec<_>>(),
        Checkpoint::ALL.to_vec()
    );
}

#[tokio::test]
async fn test_rejection_then_resubmission_replaces_answers() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0101").await;
    engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::BudgetControl,
            all_valid(Checkpoint::BudgetControl),
        ))
        .await
        .unwrap();

    let mut rejected = submission(
        &dossier,
        Checkpoint::OrderingOfficer,
        one_failed(Checkpoint::OrderingOfficer, "order form unsigned"),
    );
    rejected.general_comment = Some("Please attach the signed order".to_string());
    let receipt = engine.submit_checklist(rejected).await.unwrap();
    assert_eq!(receipt.status, SubmissionStatus::Rejected);
    assert_eq!(receipt.dossier_status, DossierStatus::RejectedCheckpoint2);
    assert_eq!(receipt.synthesis.rejected, 1);
    assert_eq!(receipt.synthesis.verdict, Verdict::Rejected);

    let stored = engine.dossier(dossier.id).await.unwrap();
    let rejection = stored.rejection.clone().unwrap();
    assert_eq!(rejection.checkpoint, Checkpoint::OrderingOfficer);
    assert!(rejection.reason.contains("order form unsigned"));
    assert_eq!(rejection.detail.as_deref(), Some("Please attach the signed order"));

    // A rejected dossier cannot be submitted again until its creator resubmits it.
    let err = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::OrderingOfficer,
            all_valid(Checkpoint::OrderingOfficer),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition_failed");

    let err = engine
        .resubmit(dossier.id, &UserId::new("someone-else"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed { .. }));

    let reopened = engine
        .resubmit(dossier.id, &UserId::new(CREATOR), Some("Signed order attached".into()))
        .await
        .unwrap();
    assert_eq!(reopened.status, DossierStatus::ApprovedCheckpoint1);
    assert!(reopened.rejection.is_none());

    let receipt = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::OrderingOfficer,
            vec![
                ChecklistAnswer::valid(201),
                ChecklistAnswer::valid(202),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(receipt.dossier_status, DossierStatus::ApprovedCheckpoint2);

    let results = engine
        .get_checklist_results(dossier.id, Checkpoint::OrderingOfficer)
        .await
        .unwrap();
    assert_eq!(results.answers.len(), 2);
    assert!(results.answers.iter().all(|a| a.valid));
    let synthesis = results.synthesis.unwrap();
    assert_eq!(synthesis.verdict, Verdict::Valid);
    assert_eq!(synthesis.total, 2);
    assert_eq!(synthesis.general_comment, None);
}

#[tokio::test]
async fn test_missing_mandatory_item_changes_nothing() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0102").await;
    let err = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::BudgetControl,
            vec![ChecklistAnswer::valid(101), ChecklistAnswer::valid(103)],
        ))
        .await
        .unwrap_err();

    match err {
        WorkflowError::MissingRequiredItem { checkpoint, items } => {
            assert_eq!(checkpoint, Checkpoint::BudgetControl);
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].id, 102);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = engine.dossier(dossier.id).await.unwrap();
    assert_eq!(stored.status, DossierStatus::Pending);
    assert_eq!(stored.version, dossier.version);
    let history = engine.checkpoint_history(dossier.id).await.unwrap();
    assert!(history.syntheses.is_empty());
    assert!(!history.quitus_ready);
}

#[tokio::test]
async fn test_answers_outside_the_checkpoint_catalog_are_refused() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0103").await;
    let mut answers = all_valid(Checkpoint::BudgetControl);
    answers.push(ChecklistAnswer::valid(201));
    answers.push(ChecklistAnswer::valid(999));

    let err = engine
        .submit_checklist(submission(&dossier, Checkpoint::BudgetControl, answers))
        .await
        .unwrap_err();
    match err {
        WorkflowError::UnknownChecklistItem { items, .. } => {
            assert!(items.contains(&201));
            assert!(items.contains(&999));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(engine
        .get_checklist_results(dossier.id, Checkpoint::BudgetControl)
        .await
        .unwrap()
        .answers
        .is_empty());
}

#[tokio::test]
async fn test_duplicate_answers_are_refused() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0104").await;
    let mut answers = all_valid(Checkpoint::BudgetControl);
    answers.push(ChecklistAnswer::invalid(101, "second opinion"));

    let err = engine
        .submit_checklist(submission(&dossier, Checkpoint::BudgetControl, answers))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateAnswer { ref items } if items == &vec![101]));
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_checkpoints_must_be_taken_in_order() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0105").await;

    let err = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::AccountingOfficer,
            all_valid(Checkpoint::AccountingOfficer),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed { .. }));

    for checkpoint in Checkpoint::ALL {
        engine
            .submit_checklist(submission(&dossier, checkpoint, all_valid(checkpoint)))
            .await
            .unwrap();
    }

    // Nothing can be submitted on a finalized dossier.
    for checkpoint in Checkpoint::ALL {
        let err = engine
            .submit_checklist(submission(&dossier, checkpoint, all_valid(checkpoint)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");
    }
    let err = engine
        .resubmit(dossier.id, &UserId::new(CREATOR), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed { .. }));
}

#[tokio::test]
async fn test_unknown_dossier_is_not_found() {
    let (engine, _) = engine_with_dossier("DOS-2026-0106").await;
    let missing = DossierId::new();
    let err = engine
        .get_checklist_results(missing, Checkpoint::BudgetControl)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = engine
        .submit_checklist(ChecklistSubmission {
            dossier_id: missing,
            checkpoint: Checkpoint::BudgetControl,
            answers: all_valid(Checkpoint::BudgetControl),
            actor_id: actor_for(Checkpoint::BudgetControl),
            general_comment: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
}

#[tokio::test]
async fn test_checkpoint_without_active_items_cannot_be_submitted() {
    let engine = WorkflowEngine::new(Arc::new(InMemoryStore::new()));
    let dossier = engine
        .create_dossier(new_dossier("DOS-2026-0107"))
        .await
        .unwrap();

    let err = engine
        .submit_checklist(submission(&dossier, Checkpoint::BudgetControl, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::EmptyCatalog {
            checkpoint: Checkpoint::BudgetControl
        }
    ));
    assert_eq!(
        engine.dossier(dossier.id).await.unwrap().status,
        DossierStatus::Pending
    );
}

#[tokio::test]
async fn test_malformed_json_request_is_invalid() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0108").await;

    let err = engine.submit_request("{not json").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_request");

    let body = serde_json::json!({
        "dossier_id": dossier.id.to_string(),
        "checkpoint": "budget-control",
        "answers": [
            {"item_id": 101, "valid": true},
            {"item_id": 102, "valid": true}
        ],
        "actor_id": "budget_controller-1"
    });
    let receipt = engine.submit_request(&body.to_string()).await.unwrap();
    assert_eq!(receipt.dossier_status, DossierStatus::ApprovedCheckpoint1);
    assert_eq!(receipt.synthesis.total, 2);
}

#[tokio::test]
async fn test_five_item_catalog_all_valid() {
    let store = Arc::new(InMemoryStore::new());
    seed_five_item_catalog(store.as_ref()).await;
    let engine = WorkflowEngine::new(store);
    let dossier = engine
        .create_dossier(new_dossier("DOS-2026-0109"))
        .await
        .unwrap();

    let answers = (11..=15).map(ChecklistAnswer::valid).collect();
    let receipt = engine
        .submit_checklist(submission(&dossier, Checkpoint::BudgetControl, answers))
        .await
        .unwrap();
    assert_eq!(receipt.synthesis.total, 5);
    assert_eq!(receipt.synthesis.validated, 5);
    assert_eq!(receipt.synthesis.rejected, 0);
    assert_eq!(receipt.synthesis.verdict, Verdict::Valid);
    assert_eq!(receipt.dossier_status, DossierStatus::ApprovedCheckpoint1);
}

#[tokio::test]
async fn test_smaller_resubmission_drops_stale_answers() {
    let store = seeded_store().await;
    let engine = WorkflowEngine::new(store.clone());
    let dossier = engine
        .create_dossier(new_dossier("DOS-2026-0110"))
        .await
        .unwrap();

    let receipt = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::BudgetControl,
            vec![
                ChecklistAnswer::valid(101),
                ChecklistAnswer::valid(102),
                ChecklistAnswer::invalid(103, "annex missing"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(receipt.dossier_status, DossierStatus::RejectedCheckpoint1);

    engine
        .resubmit(dossier.id, &UserId::new(CREATOR), None)
        .await
        .unwrap();
    let receipt = engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::BudgetControl,
            vec![ChecklistAnswer::valid(101), ChecklistAnswer::valid(102)],
        ))
        .await
        .unwrap();
    assert_eq!(receipt.dossier_status, DossierStatus::ApprovedCheckpoint1);

    let stored = store
        .load_validations(dossier.id, Checkpoint::BudgetControl)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|v| v.item_id != 103 && v.valid));
}

#[tokio::test]
async fn test_empty_answer_set_names_the_missing_items() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0111").await;
    let body = serde_json::json!({
        "dossier_id": dossier.id.to_string(),
        "checkpoint": "budget-control",
        "answers": [],
        "actor_id": "budget_controller-1"
    });

    let err = engine.submit_request(&body.to_string()).await.unwrap_err();
    assert_eq!(err.kind(), "missing_required_item");
    match err {
        WorkflowError::MissingRequiredItem { checkpoint, items } => {
            assert_eq!(checkpoint, Checkpoint::BudgetControl);
            let ids: Vec<_> = items.iter().map(|item| item.id).collect();
            assert_eq!(ids, vec![101, 102]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        engine.dossier(dossier.id).await.unwrap().status,
        DossierStatus::Pending
    );
}

#[tokio::test]
async fn test_read_checkpoint_checks_its_inputs() {
    let (engine, dossier) = engine_with_dossier("DOS-2026-0112").await;
    engine
        .submit_checklist(submission(
            &dossier,
            Checkpoint::BudgetControl,
            all_valid(Checkpoint::BudgetControl),
        ))
        .await
        .unwrap();

    let err = engine
        .read_checkpoint(ReadCheckpointRequest {
            dossier_id: "not-a-uuid".to_string(),
            checkpoint: "budget-control".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");

    let err = engine
        .read_checkpoint(ReadCheckpointRequest {
            dossier_id: dossier.id.to_string(),
            checkpoint: "treasury".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert!(err.details()[0].contains("treasury"));

    let results = engine
        .read_checkpoint(ReadCheckpointRequest {
            dossier_id: dossier.id.to_string(),
            checkpoint: "1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(results.answers.len(), 3);
    assert_eq!(results.synthesis.unwrap().verdict, Verdict::Valid);
}
