//! Shared catalog and dossier fixtures for the workflow integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use dossier_flow::checklist::{ChecklistAnswer, ChecklistCategory, ChecklistItem, ItemId};
use dossier_flow::dossier::{Checkpoint, Dossier, NewDossier, UserId};
use dossier_flow::store::{InMemoryStore, ReferenceData};
use dossier_flow::workflows::{ChecklistSubmission, WorkflowEngine};

pub const CREATOR: &str = "originator-1";

/// Three items per checkpoint: two mandatory, one optional.
/// Ids are `checkpoint * 100 + n`.
pub fn item_ids(checkpoint: Checkpoint) -> [ItemId; 3] {
    let base = checkpoint.number() as ItemId * 100;
    [base + 1, base + 2, base + 3]
}

pub fn mandatory_ids(checkpoint: Checkpoint) -> [ItemId; 2] {
    let [a, b, _] = item_ids(checkpoint);
    [a, b]
}

pub fn actor_for(checkpoint: Checkpoint) -> UserId {
    UserId::new(format!("{}-1", checkpoint.responsible_role()))
}

pub async fn seed_catalog(store: &dyn ReferenceData) {
    for checkpoint in Checkpoint::ALL {
        let category_id = checkpoint.number() as i64;
        store
            .put_category(ChecklistCategory {
                id: category_id,
                checkpoint,
                name: format!("{} controls", checkpoint),
                display_order: 1,
                active: true,
            })
            .await
            .expect("category");
        for (position, id) in item_ids(checkpoint).into_iter().enumerate() {
            store
                .put_item(ChecklistItem {
                    id,
                    category_id,
                    name: format!("Control {id}"),
                    mandatory: position < 2,
                    display_order: position as i32,
                    active: true,
                })
                .await
                .expect("item");
        }
    }
}

/// A single budget-control category of five items, the first three mandatory.
/// Ids run from 11 to 15.
pub async fn seed_five_item_catalog(store: &dyn ReferenceData) {
    store
        .put_category(ChecklistCategory {
            id: 10,
            checkpoint: Checkpoint::BudgetControl,
            name: "Commitment checks".to_string(),
            display_order: 1,
            active: true,
        })
        .await
        .expect("category");
    for position in 0..5 {
        let id = 11 + position as ItemId;
        store
            .put_item(ChecklistItem {
                id,
                category_id: 10,
                name: format!("Commitment check {id}"),
                mandatory: position < 3,
                display_order: position,
                active: true,
            })
            .await
            .expect("item");
    }
}

pub async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    seed_catalog(store.as_ref()).await;
    store
}

pub fn new_dossier(case_number: &str) -> NewDossier {
    NewDossier {
        case_number: case_number.to_string(),
        amount: 48_500,
        creator_id: UserId::new(CREATOR),
        nature_id: Some(2),
        budget_line_id: Some(17),
    }
}

pub async fn engine_with_dossier(case_number: &str) -> (WorkflowEngine, Dossier) {
    let engine = WorkflowEngine::new(seeded_store().await);
    let dossier = engine
        .create_dossier(new_dossier(case_number))
        .await
        .expect("dossier");
    (engine, dossier)
}

pub fn all_valid(checkpoint: Checkpoint) -> Vec<ChecklistAnswer> {
    item_ids(checkpoint)
        .into_iter()
        .map(ChecklistAnswer::valid)
        .collect()
}

/// Mandatory items answered, the first one failed.
pub fn one_failed(checkpoint: Checkpoint, comment: &str) -> Vec<ChecklistAnswer> {
    let [a, b] = mandatory_ids(checkpoint);
    vec![ChecklistAnswer::invalid(a, comment), ChecklistAnswer::valid(b)]
}

pub fn submission(
    dossier: &Dossier,
    checkpoint: Checkpoint,
    answers: Vec<ChecklistAnswer>,
) -> ChecklistSubmission {
    ChecklistSubmission {
        dossier_id: dossier.id,
        checkpoint,
        answers,
        actor_id: actor_for(checkpoint),
        general_comment: None,
    }
}
