use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;

use super::{emit, workflow_failure, Workspace};
use crate::cli::OutputFormat;
use crate::workflows::SubmissionStatus;

pub struct SubmitCommand {
    /// Request file; stdin when `None`
    pub request: Option<PathBuf>,
    pub format: OutputFormat,
}

impl SubmitCommand {
    pub fn new(request: Option<PathBuf>, format: OutputFormat) -> Self {
        Self { request, format }
    }

    fn read_request(&self) -> Result<String> {
        match &self.request {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request {}", path.display())),
            None => {
                let mut raw = String::new();
                std::io::stdin()
                    .read_to_string(&mut raw)
                    .context("Failed to read request from stdin")?;
                Ok(raw)
            }
        }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let raw = self.read_request()?;
        let receipt = workspace
            .engine()
            .submit_request(&raw)
            .await
            .map_err(|e| workflow_failure(self.format, e))?;

        emit(self.format, &receipt, |receipt| {
            let icon = match receipt.status {
                SubmissionStatus::Approved => "✅",
                SubmissionStatus::Rejected => "❌",
            };
            println!(
                "{} Checkpoint {} {:?}: dossier is now {}",
                icon, receipt.recorded.checkpoint, receipt.status, receipt.dossier_status
            );
            println!(
                "   {} answers, {} validated, {} rejected, verdict {}",
                receipt.synthesis.total,
                receipt.synthesis.validated,
                receipt.synthesis.rejected,
                receipt.synthesis.verdict
            );
            for item in &receipt.per_item {
                let mark = if item.valid { "✔" } else { "✘" };
                match &item.comment {
                    Some(comment) => println!("   {} [{}] {} - {}", mark, item.item_id, item.name, comment),
                    None => println!("   {} [{}] {}", mark, item.item_id, item.name),
                }
            }
        })
    }
}
