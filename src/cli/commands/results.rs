use anyhow::Result;

use super::{emit, workflow_failure, Workspace};
use crate::cli::OutputFormat;
use crate::workflows::ReadCheckpointRequest;

pub struct ResultsCommand {
    pub dossier: String,
    pub checkpoint: String,
    pub format: OutputFormat,
}

impl ResultsCommand {
    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let request = ReadCheckpointRequest {
            dossier_id: self.dossier.clone(),
            checkpoint: self.checkpoint.clone(),
        };
        let results = workspace
            .engine()
            .read_checkpoint(request)
            .await
            .map_err(|e| workflow_failure(self.format, e))?;

        emit(self.format, &results, |results| {
            println!(
                "📄 Dossier {} at {} (status {})",
                results.dossier_id, results.checkpoint, results.dossier_status
            );
            for group in &results.categories {
                println!();
                println!("  {}", group.category.name);
                for entry in &group.items {
                    let mark = match &entry.answer {
                        Some(answer) if answer.valid => "✔",
                        Some(_) => "✘",
                        None => "·",
                    };
                    println!("    {} [{}] {}", mark, entry.item.id, entry.item.name);
                }
            }
            println!();
            match &results.synthesis {
                Some(s) => println!(
                    "  Synthesis: {}/{} validated, verdict {} by {}",
                    s.validated, s.total, s.verdict, s.actor_id
                ),
                None => println!("  No synthesis recorded yet"),
            }
        })
    }
}
