// Checklist reference data, answer recording and verdict aggregation

pub mod catalog;
pub mod recorder;
pub mod synthesis;

pub use catalog::{
    ActiveCatalog, CatalogCategory, CategoryId, ChecklistCatalog, ChecklistCategory, ChecklistItem,
    ItemId,
};
pub use recorder::{ChecklistAnswer, ChecklistValidation, ValidationRecorder};
pub use synthesis::{rejection_reason, Synthesis, ValidationSynthesis, Verdict};
