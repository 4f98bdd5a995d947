use anyhow::Result;

use super::{emit, parse_dossier_id, workflow_failure, Workspace};
use crate::cli::OutputFormat;
use crate::dossier::UserId;

pub struct ResubmitCommand {
    pub dossier: String,
    pub actor: String,
    pub comment: Option<String>,
    pub format: OutputFormat,
}

impl ResubmitCommand {
    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let fail = |e| workflow_failure(self.format, e);
        let dossier_id = parse_dossier_id(&self.dossier).map_err(fail)?;
        let dossier = workspace
            .engine()
            .resubmit(dossier_id, &UserId::new(self.actor.trim()), self.comment.clone())
            .await
            .map_err(fail)?;

        emit(self.format, &dossier, |dossier| {
            println!(
                "🔁 Dossier {} resubmitted, status is now {}",
                dossier.case_number, dossier.status
            );
        })
    }
}
