//! Gardener CLI - Command-line interface for the Gardener knowledge base.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use gardener_core::GardenerError;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "gardener")]
#[command(about = "State tracking for a version-controlled knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Knowledge base data directory
    #[arg(long, global = true, env = "GARDENER_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a knowledge base and its repository
    Init,
    /// Show pointer state and uncommitted work
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Review repository changes since the last reconcile
    Reconcile {
        /// Include the classified change list
        #[arg(long)]
        details: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List classified changes from a commit to head
    Changes {
        /// Starting commit (omit for a full listing)
        #[arg(long)]
        since: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Commit uncommitted work as a manual edit
    Snapshot {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop a note into the inbox
    Submit {
        /// Note text, or '-' to read stdin
        text: String,
    },
    /// Process inbox notes through a classifier command
    Ingest {
        /// Shell command that reads a JSON request and prints a decision
        #[arg(long, env = "GARDENER_CLASSIFIER_CMD")]
        classifier_cmd: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show edit provenance
    Provenance {
        /// Data-dir-relative path
        #[arg(long, conflicts_with = "source", required_unless_present = "source")]
        path: Option<String>,
        /// Source tag (organizer, manual, external:<tool>)
        #[arg(long)]
        source: Option<String>,
        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent reconcile runs and processed commits
    History {
        /// Maximum number of entries of each kind
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Prune old bookkeeping
    Maintain {
        /// Processed commits to keep
        #[arg(long)]
        keep_commits: Option<usize>,
        /// Provenance records to keep
        #[arg(long)]
        keep_provenance: Option<usize>,
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Check state store integrity
    Verify {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    // Respects RUST_LOG (e.g., RUST_LOG=gardener_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let dir = cli.data_dir.as_path();
    match cli.command {
        Commands::Init => commands::init::run(dir),
        Commands::Status { json } => commands::status::run(dir, json),
        Commands::Reconcile { details, json } => commands::reconcile::run(dir, details, json),
        Commands::Changes { since, json } => commands::changes::run(dir, since.as_deref(), json),
        Commands::Snapshot { message, json } => {
            commands::snapshot::run(dir, message.as_deref(), json)
        }
        Commands::Submit { text } => commands::submit::run(dir, &text),
        Commands::Ingest {
            classifier_cmd,
            json,
        } => commands::ingest::run(dir, &classifier_cmd, json),
        Commands::Provenance {
            path,
            source,
            limit,
            json,
        } => commands::provenance::run(dir, path.as_deref(), source.as_deref(), limit, json),
        Commands::History { limit, json } => commands::history::run(dir, limit, json),
        Commands::Maintain {
            keep_commits,
            keep_provenance,
            dry_run,
        } => commands::maintain::run(dir, keep_commits, keep_provenance, dry_run),
        Commands::Verify { json } => commands::verify::run(dir, json),
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {:#}", style("error:").red().bold(), err);
    let suggestion = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<GardenerError>())
        .and_then(GardenerError::recovery_suggestion);
    if let Some(hint) = suggestion {
        eprintln!("  {} {}", style("hint:").cyan(), hint);
    }
}
