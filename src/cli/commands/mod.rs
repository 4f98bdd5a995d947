use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::dossier::{Checkpoint, DossierId};
use crate::workflows::WorkflowError;

pub mod catalog;
pub mod history;
pub mod resubmit;
pub mod results;
pub mod seed;
pub mod submit;
pub mod workspace;

pub use workspace::Workspace;

/// Prints `value` as JSON, or hands it to `text` for the human layout.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Reports a workflow error in the requested format and hands it back for the exit status.
pub fn workflow_failure(format: OutputFormat, err: WorkflowError) -> anyhow::Error {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": err.report() });
            match serde_json::to_string_pretty(&body) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => eprintln!("❌ Failed to render error report: {e}"),
            }
        }
        OutputFormat::Text => {
            eprintln!("❌ {err}");
            for detail in err.details() {
                eprintln!("   - {detail}");
            }
        }
    }
    anyhow::Error::new(err)
}

pub fn parse_dossier_id(raw: &str) -> Result<DossierId, WorkflowError> {
    raw.parse().map_err(|e| WorkflowError::InvalidRequest {
        details: vec![format!("dossier '{raw}' is not a UUID: {e}")],
    })
}

pub fn parse_checkpoint(raw: &str) -> Result<Checkpoint, WorkflowError> {
    raw.parse()
        .map_err(|e: String| WorkflowError::InvalidRequest { details: vec![e] })
}
