// Workflow orchestration modules
// Transitions are committed atomically; announcements follow the commit.

pub mod engine;
pub mod errors;
pub mod locks;
pub mod request;
pub mod state_machine;

pub use engine::{AnsweredItem, CategoryResults, CheckpointHistory, ChecklistResults, WorkflowEngine};
pub use errors::{ErrorReport, ItemRef, WorkflowError};
pub use locks::DossierLocks;
pub use request::{
    parse_submission, AnswerPayload, ChecklistSubmission, ItemResult, ReadCheckpointRequest,
    SubmissionReceipt, SubmissionStatus, SubmitChecklistRequest,
};
pub use state_machine::{
    next_status, submittable_checkpoint, DossierStateMachine, StateTransitionRecord,
    TransitionError, WorkflowEvent,
};
