use crate::paths::{DEFAULT_MANIFEST, ENV_MANIFEST};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pgconverge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge PostgreSQL databases, roles and grants to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest describing the desired state
    #[arg(short = 'f', long, global = true, env = ENV_MANIFEST, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile every declared resource once
    Apply(ApplyArgs),

    /// Reconcile periodically until interrupted
    Run(RunArgs),

    /// Preview what apply would change
    Diff(DiffArgs),

    /// Show the last recorded status of each resource
    Status,

    /// Validate the manifest without connecting anywhere
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Only apply a kind or a single resource: database, account.svc, ...
    #[arg(short, long)]
    pub target: Option<String>,

    /// Observe and plan, but execute nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Resources reconciled in parallel (defaults to the manifest setting)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Seconds between resyncs (defaults to the manifest setting)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Resources reconciled in parallel (defaults to the manifest setting)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Only diff a kind or a single resource
    #[arg(short, long)]
    pub target: Option<String>,
}
