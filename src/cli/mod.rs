use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "dossier-flow")]
#[command(about = "Checklist-driven approval workflow for accounting dossiers")]
#[command(long_about = "Dossier Flow moves accounting dossiers through budget control, the ordering \
                       officer and the accounting officer. Each checkpoint is decided by a checklist; \
                       a single failed control rejects the dossier back to its creator.")]
pub struct Cli {
    /// JSON fixture with catalog, role assignments, dossiers and submissions to replay
    #[arg(long, global = true, help = "Seed the store from a JSON fixture before running the command")]
    pub seed: Option<PathBuf>,

    /// SQLite database URL, e.g. sqlite://dossiers.db (requires the `database` feature)
    #[arg(long, global = true, help = "Use a persistent SQLite store instead of the in-memory one")]
    pub database: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the active checklist of a checkpoint
    Catalog {
        /// Checkpoint name or number (budget-control, ordering-officer, accounting-officer or 1-3)
        #[arg(long, short = 'c')]
        checkpoint: String,
    },
    /// Submit a checklist for a dossier at one checkpoint
    Submit {
        /// JSON request file; reads stdin when omitted
        #[arg(long, short = 'r', help = "Path to the JSON submit request (stdin when omitted)")]
        request: Option<PathBuf>,
    },
    /// Show the checklist and recorded answers of a dossier at one checkpoint
    Results {
        #[arg(long, short = 'd')]
        dossier: String,
        #[arg(long, short = 'c')]
        checkpoint: String,
    },
    /// Send a rejected dossier back to the checkpoint that rejected it
    Resubmit {
        #[arg(long, short = 'd')]
        dossier: String,
        /// Creator of the dossier
        #[arg(long, short = 'a')]
        actor: String,
        #[arg(long, short = 'm')]
        comment: Option<String>,
    },
    /// Show every checkpoint synthesis of a dossier and whether the quitus can be compiled
    History {
        #[arg(long, short = 'd')]
        dossier: String,
    },
}
