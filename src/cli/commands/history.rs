use anyhow::Result;

use super::{emit, parse_dossier_id, workflow_failure, Workspace};
use crate::cli::OutputFormat;

pub struct HistoryCommand {
    pub dossier: String,
    pub format: OutputFormat,
}

impl HistoryCommand {
    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let fail = |e| workflow_failure(self.format, e);
        let dossier_id = parse_dossier_id(&self.dossier).map_err(fail)?;
        let history = workspace
            .engine()
            .checkpoint_history(dossier_id)
            .await
            .map_err(fail)?;

        emit(self.format, &history, |history| {
            println!("🗂️  Dossier {} ({})", history.case_number, history.status);
            if history.syntheses.is_empty() {
                println!("   No checkpoint decided yet");
            }
            for s in &history.syntheses {
                println!(
                    "   {} {}: {}/{} validated, {} rejected, by {} at {}",
                    s.checkpoint.number(),
                    s.checkpoint,
                    s.validated,
                    s.total,
                    s.rejected,
                    s.actor_id,
                    s.created_at.to_rfc3339()
                );
            }
            if history.quitus_ready {
                println!("🎯 Every checkpoint passed, the quitus can be compiled");
            }
        })
    }
}
