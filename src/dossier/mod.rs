// Dossier domain model: identities, lifecycle status, checkpoints and roles

pub mod types;

pub use types::{
    is_valid_case_number, Checkpoint, Dossier, DossierId, DossierStatus, NewDossier,
    RejectionRecord, Role, UserId,
};
