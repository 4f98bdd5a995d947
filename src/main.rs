use anyhow::Result;
use clap::Parser;

use dossier_flow::cli::commands::catalog::CatalogCommand;
use dossier_flow::cli::commands::history::HistoryCommand;
use dossier_flow::cli::commands::resubmit::ResubmitCommand;
use dossier_flow::cli::commands::results::ResultsCommand;
use dossier_flow::cli::commands::submit::SubmitCommand;
use dossier_flow::cli::commands::Workspace;
use dossier_flow::cli::{Cli, Commands, OutputFormat};
use dossier_flow::{config, init_config, init_telemetry, shutdown_telemetry, DossierFlowConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config()?.clone();
    init_telemetry(&settings.observability)?;
    init_config()?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        let workspace = open_workspace(&cli, &settings).await?;
        let outcome = run_command(cli.command, cli.format, &workspace).await;
        let closed = workspace.close().await;
        outcome.and(closed)
    });

    shutdown_telemetry();
    result
}

async fn open_workspace(cli: &Cli, settings: &DossierFlowConfig) -> Result<Workspace> {
    #[cfg(feature = "database")]
    {
        if let Some(url) = &cli.database {
            return Workspace::sqlite(settings, url, cli.seed.as_deref()).await;
        }
    }
    #[cfg(not(feature = "database"))]
    if cli.database.is_some() {
        anyhow::bail!("--database needs a build with the `database` feature");
    }
    Workspace::in_memory(settings, cli.seed.as_deref()).await
}

async fn run_command(command: Commands, format: OutputFormat, workspace: &Workspace) -> Result<()> {
    match command {
        Commands::Catalog { checkpoint } => {
            CatalogCommand::new(checkpoint, format).execute(workspace).await
        }
        Commands::Submit { request } => SubmitCommand::new(request, format).execute(workspace).await,
        Commands::Results { dossier, checkpoint } => {
            ResultsCommand {
                dossier,
                checkpoint,
                format,
            }
            .execute(workspace)
            .await
        }
        Commands::Resubmit {
            dossier,
            actor,
            comment,
        } => {
            ResubmitCommand {
                dossier,
                actor,
                comment,
                format,
            }
            .execute(workspace)
            .await
        }
        Commands::History { dossier } => {
            HistoryCommand { dossier, format }.execute(workspace).await
        }
    }
}
