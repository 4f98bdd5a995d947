// Dossier Flow Library - Checklist-driven approval workflow
// This exposes the core components for testing and integration

pub mod checklist;
pub mod cli;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod dossier;
pub mod notifications;
pub mod observability;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use checklist::{
    ActiveCatalog, ChecklistAnswer, ChecklistCatalog, ChecklistCategory, ChecklistItem,
    ChecklistValidation, Synthesis, ValidationSynthesis, Verdict,
};
pub use config::{config, init_config, DossierFlowConfig};
pub use dossier::{Checkpoint, Dossier, DossierId, DossierStatus, NewDossier, Role, UserId};
pub use notifications::{
    DispatchStats, DispatcherHandle, Notification, NotificationDispatcher, NotificationSink,
    NotificationType, TransitionOutcome,
};
pub use observability::{create_workflow_span, workflow_metrics, OperationTimer, WorkflowMetrics};
pub use shutdown::ShutdownCoordinator;
pub use store::{InMemoryStore, ReferenceData, StoreError, WorkflowStore};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    ChecklistResults, ChecklistSubmission, CheckpointHistory, SubmissionReceipt,
    SubmitChecklistRequest, WorkflowEngine, WorkflowError,
};

#[cfg(feature = "database")]
pub use database::{DatabaseManager, SqliteStore};
