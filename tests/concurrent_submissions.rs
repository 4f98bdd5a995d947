//! Racing submissions against one dossier serialize; exactly one wins.

mod fixtures;

use futures::future::join_all;
use std::sync::Arc;

use dossier_flow::dossier::{Checkpoint, DossierStatus};
use dossier_flow::workflows::{WorkflowEngine, WorkflowError};
use fixtures::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_have_a_single_winner() {
    let engine = Arc::new(WorkflowEngine::new(seeded_store().await));
    let dossier = engine
        .create_dossier(new_dossier("DOS-2026-0300"))
        .await
        .unwrap();

    let attempts = (0..8).map(|n| {
        let engine = engine.clone();
        let mut request = submission(
            &dossier,
            Checkpoint::BudgetControl,
            if n % 2 == 0 {
                all_valid(Checkpoint::BudgetControl)
            } else {
                one_failed(Checkpoint::BudgetControl, "late invoice")
            },
        );
        request.general_comment = Some(format!("attempt {n}"));
        tokio::spawn(async move { engine.submit_checklist(request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    WorkflowError::PreconditionFailed { .. }
                        | WorkflowError::ConcurrentModification { .. }
                ),
                "unexpected error: {err:?}"
            );
        }
    }

    let stored = engine.dossier(dossier.id).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, winners[0].dossier_status);
    assert!(matches!(
        stored.status,
        DossierStatus::ApprovedCheckpoint1 | DossierStatus::RejectedCheckpoint1
    ));

    // The stored answers and synthesis belong to the winning attempt only.
    let results = engine
        .get_checklist_results(dossier.id, Checkpoint::BudgetControl)
        .await
        .unwrap();
    let synthesis = results.synthesis.unwrap();
    assert_eq!(synthesis.general_comment, winners[0].recorded.general_comment);
    assert_eq!(synthesis.verdict, winners[0].synthesis.verdict);
    assert_eq!(results.answers.len(), winners[0].per_item.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_dossiers_progress_independently() {
    let engine = Arc::new(WorkflowEngine::new(seeded_store().await));
    let mut dossiers = Vec::new();
    for n in 0..6 {
        dossiers.push(
            engine
                .create_dossier(new_dossier(&format!("DOS-2026-03{:02}", n + 10)))
                .await
                .unwrap(),
        );
    }

    let runs = dossiers.iter().cloned().map(|dossier| {
        let engine = engine.clone();
        tokio::spawn(async move {
            for checkpoint in Checkpoint::ALL {
                engine
                    .submit_checklist(submission(&dossier, checkpoint, all_valid(checkpoint)))
                    .await?;
            }
            Ok::<_, WorkflowError>(dossier.id)
        })
    });
    for joined in join_all(runs).await {
        let id = joined.unwrap().unwrap();
        let history = engine.checkpoint_history(id).await.unwrap();
        assert!(history.quitus_ready);
    }
}
