use anyhow::Result;

use super::{emit, parse_checkpoint, workflow_failure, Workspace};
use crate::cli::OutputFormat;

pub struct CatalogCommand {
    pub checkpoint: String,
    pub format: OutputFormat,
}

impl CatalogCommand {
    pub fn new(checkpoint: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            format,
        }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let checkpoint =
            parse_checkpoint(&self.checkpoint).map_err(|e| workflow_failure(self.format, e))?;
        let categories = workspace
            .engine()
            .list_active_categories(checkpoint)
            .await
            .map_err(|e| workflow_failure(self.format, e))?;

        emit(self.format, &categories, |categories| {
            println!(
                "📋 Checklist for checkpoint {} ({})",
                checkpoint.number(),
                checkpoint
            );
            if categories.is_empty() {
                println!("   No active categories configured");
                return;
            }
            for group in categories {
                println!();
                println!("  {}", group.category.name);
                for item in &group.items {
                    let flag = if item.mandatory { "mandatory" } else { "optional" };
                    println!("    [{}] {} ({})", item.id, item.name, flag);
                }
            }
        })
    }
}
