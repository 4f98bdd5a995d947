// Boundary schema: loosely typed JSON payloads are decoded with unknown fields
// refused, then coerced into strict internal types before any store access.

use serde::{Deserialize, Serialize};

use super::errors::WorkflowError;
use crate::checklist::{ChecklistAnswer, ItemId, Synthesis, ValidationSynthesis, Verdict};
use crate::dossier::{Checkpoint, DossierId, DossierStatus, UserId};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerPayload {
    pub item_id: ItemId,
    pub valid: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub evidence_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitChecklistRequest {
    pub dossier_id: String,
    pub checkpoint: String,
    pub answers: Vec<AnswerPayload>,
    pub actor_id: String,
    #[serde(default)]
    pub general_comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadCheckpointRequest {
    pub dossier_id: String,
    pub checkpoint: String,
}

/// A submission that passed boundary checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistSubmission {
    pub dossier_id: DossierId,
    pub checkpoint: Checkpoint,
    pub answers: Vec<ChecklistAnswer>,
    pub actor_id: UserId,
    pub general_comment: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_dossier_id(raw: &str, problems: &mut Vec<String>) -> Option<DossierId> {
    match raw.parse::<DossierId>() {
        Ok(id) => Some(id),
        Err(e) => {
            problems.push(format!("dossier_id '{raw}' is not a UUID: {e}"));
            None
        }
    }
}

fn parse_checkpoint(raw: &str, problems: &mut Vec<String>) -> Option<Checkpoint> {
    match raw.parse::<Checkpoint>() {
        Ok(cp) => Some(cp),
        Err(e) => {
            problems.push(e);
            None
        }
    }
}

impl TryFrom<SubmitChecklistRequest> for ChecklistSubmission {
    type Error = WorkflowError;

    fn try_from(request: SubmitChecklistRequest) -> Result<Self, Self::Error> {
        let mut problems = Vec::new();
        let dossier_id = parse_dossier_id(&request.dossier_id, &mut problems);
        let checkpoint = parse_checkpoint(&request.checkpoint, &mut problems);
        let actor = request.actor_id.trim().to_string();
        if actor.is_empty() {
            problems.push("actor_id is empty".to_string());
        }

        match (dossier_id, checkpoint) {
            (Some(dossier_id), Some(checkpoint)) if problems.is_empty() => Ok(Self {
                dossier_id,
                checkpoint,
                answers: request
                    .answers
                    .into_iter()
                    .map(|a| ChecklistAnswer {
                        item_id: a.item_id,
                        valid: a.valid,
                        comment: non_blank(a.comment),
                        evidence_ref: non_blank(a.evidence_ref),
                    })
                    .collect(),
                actor_id: UserId::new(actor),
                general_comment: non_blank(request.general_comment),
            }),
            _ => Err(WorkflowError::InvalidRequest { details: problems }),
        }
    }
}

impl ReadCheckpointRequest {
    pub fn parse(self) -> Result<(DossierId, Checkpoint), WorkflowError> {
        let mut problems = Vec::new();
        let dossier_id = parse_dossier_id(&self.dossier_id, &mut problems);
        let checkpoint = parse_checkpoint(&self.checkpoint, &mut problems);
        match (dossier_id, checkpoint) {
            (Some(id), Some(cp)) => Ok((id, cp)),
            _ => Err(WorkflowError::InvalidRequest { details: problems }),
        }
    }
}

/// Decodes a JSON submission payload into a [`ChecklistSubmission`].
pub fn parse_submission(json: &str) -> Result<ChecklistSubmission, WorkflowError> {
    let request: SubmitChecklistRequest =
        serde_json::from_str(json).map_err(|e| WorkflowError::InvalidRequest {
            details: vec![e.to_string()],
        })?;
    request.try_into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Approved,
    Rejected,
}

impl From<Verdict> for SubmissionStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Valid => SubmissionStatus::Approved,
            Verdict::Rejected => SubmissionStatus::Rejected,
        }
    }
}

/// Outcome of one recorded checklist answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: ItemId,
    pub name: String,
    pub category: String,
    pub mandatory: bool,
    pub valid: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub status: SubmissionStatus,
    pub dossier_status: DossierStatus,
    pub synthesis: Synthesis,
    pub per_item: Vec<ItemResult>,
    pub recorded: ValidationSynthesis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_are_refused() {
        let json = r#"{
            "dossier_id": "4b4f5c8a-3a57-4f53-9b7f-1d1f0f3a2b10",
            "checkpoint": "budget-control",
            "answers": [{"item_id": 1, "valid": true, "score": 4}],
            "actor_id": "controller-1"
        }"#;
        let err = parse_submission(json).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert!(err.details()[0].contains("score"));
    }

    #[test]
    fn test_payload_is_coerced_into_internal_types() {
        let json = r#"{
            "dossier_id": "4b4f5c8a-3a57-4f53-9b7f-1d1f0f3a2b10",
            "checkpoint": "2",
            "answers": [{"item_id": 7, "valid": false, "comment": "  ", "evidence_ref": "scan-12"}],
            "actor_id": " officer-9 ",
            "general_comment": "Needs the signed order"
        }"#;
        let submission = parse_submission(json).unwrap();
        assert_eq!(submission.checkpoint, Checkpoint::OrderingOfficer);
        assert_eq!(submission.actor_id, UserId::new("officer-9"));
        assert_eq!(submission.answers[0].comment, None);
        assert_eq!(submission.answers[0].evidence_ref.as_deref(), Some("scan-12"));
    }

    #[test]
    fn test_all_boundary_problems_are_reported_together() {
        let request = SubmitChecklistRequest {
            dossier_id: "not-a-uuid".to_string(),
            checkpoint: "treasury".to_string(),
            answers: vec![],
            actor_id: String::new(),
            general_comment: None,
        };
        let err = ChecklistSubmission::try_from(request).unwrap_err();
        assert_eq!(err.details().len(), 3);
    }

    #[test]
    fn test_empty_answer_set_is_left_to_the_catalog_checks() {
        let json = r#"{
            "dossier_id": "4b4f5c8a-3a57-4f53-9b7f-1d1f0f3a2b10",
            "checkpoint": "budget-control",
            "answers": [],
            "actor_id": "controller-1"
        }"#;
        let submission = parse_submission(json).unwrap();
        assert!(submission.answers.is_empty());
    }

    #[test]
    fn test_read_request_reports_both_bad_fields() {
        let err = ReadCheckpointRequest {
            dossier_id: "DOS-2026-0001".to_string(),
            checkpoint: "4".to_string(),
        }
        .parse()
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        let details = err.details();
        assert_eq!(details.len(), 2);
        assert!(details[0].contains("not a UUID"));
        assert!(details[1].contains("unknown checkpoint number 4"));
    }

    #[test]
    fn test_read_request_accepts_names_and_numbers() {
        let (id, checkpoint) = ReadCheckpointRequest {
            dossier_id: " 4b4f5c8a-3a57-4f53-9b7f-1d1f0f3a2b10 ".to_string(),
            checkpoint: "accounting-officer".to_string(),
        }
        .parse()
        .unwrap();
        assert_eq!(id.to_string(), "4b4f5c8a-3a57-4f53-9b7f-1d1f0f3a2b10");
        assert_eq!(checkpoint, Checkpoint::AccountingOfficer);
    }
}
