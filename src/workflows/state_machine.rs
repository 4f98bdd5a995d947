// Dossier lifecycle transitions
// Pure: no persistence, no clock other than the record timestamp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::checklist::Verdict;
use crate::dossier::{Checkpoint, DossierStatus};

/// Events that move a dossier along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    /// A checkpoint's checklist was recorded and aggregated into a verdict.
    CheckpointDecided {
        checkpoint: Checkpoint,
        verdict: Verdict,
    },
    /// The creator sent a rejected dossier back into the chain.
    Resubmitted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {event:?} not allowed from {from}")]
    InvalidTransition {
        from: DossierStatus,
        event: WorkflowEvent,
    },
}

/// The only checkpoint that may be submitted from `status`, if any.
pub fn submittable_checkpoint(status: DossierStatus) -> Option<Checkpoint> {
    Checkpoint::ALL
        .into_iter()
        .find(|cp| cp.precondition() == status)
}

/// Transition table of the approval chain.
pub fn next_status(
    from: DossierStatus,
    event: WorkflowEvent,
) -> Result<DossierStatus, TransitionError> {
    match event {
        WorkflowEvent::CheckpointDecided {
            checkpoint,
            verdict,
        } if checkpoint.precondition() == from => Ok(match verdict {
            Verdict::Valid => checkpoint.approved_status(),
            Verdict::Rejected => checkpoint.rejected_status(),
        }),
        WorkflowEvent::Resubmitted => match from.rejected_at() {
            Some(checkpoint) => Ok(checkpoint.precondition()),
            None => Err(TransitionError::InvalidTransition { from, event }),
        },
        _ => Err(TransitionError::InvalidTransition { from, event }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionRecord {
    pub from_state: DossierStatus,
    pub to_state: DossierStatus,
    pub event: WorkflowEvent,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of a single dossier, resumed from its persisted status.
#[derive(Debug, Clone)]
pub struct DossierStateMachine {
    current_state: DossierStatus,
    state_history: Vec<StateTransitionRecord>,
}

impl Default for DossierStateMachine {
    fn default() -> Self {
        Self::resume(DossierStatus::Pending)
    }
}

impl DossierStateMachine {
    pub fn resume(status: DossierStatus) -> Self {
        Self {
            current_state: status,
            state_history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> DossierStatus {
        self.current_state
    }

    pub fn state_history(&self) -> &[StateTransitionRecord] {
        &self.state_history
    }

    pub fn submittable_checkpoint(&self) -> Option<Checkpoint> {
        submittable_checkpoint(self.current_state)
    }

    /// Applies `event`, recording the transition. The state is untouched on error.
    pub fn handle_event(
        &mut self,
        event: WorkflowEvent,
    ) -> Result<StateTransitionRecord, TransitionError> {
        let to_state = match next_status(self.current_state, event) {
            Ok(status) => status,
            Err(e) => {
                error!(
                    current_state = %self.current_state,
                    event = ?event,
                    "Invalid dossier workflow transition"
                );
                return Err(e);
            }
        };

        let record = StateTransitionRecord {
            from_state: self.current_state,
            to_state,
            event,
            timestamp: Utc::now(),
        };
        info!(
            from_state = %record.from_state,
            to_state = %record.to_state,
            event = ?record.event,
            "Dossier workflow state transition"
        );

        self.current_state = to_state;
        self.state_history.push(record.clone());
        Ok(record)
    }
}
