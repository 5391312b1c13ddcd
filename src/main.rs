mod api;
mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod paths;
mod pg;
mod report;
mod state;
mod ui;
mod validate;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Manifest path as given, before expansion
    pub manifest: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        manifest: cli.manifest,
    };

    match cli.command {
        Command::Apply(args) => {
            commands::apply::run(&ctx, args.target.as_deref(), args.dry_run, args.jobs)
        }
        Command::Run(args) => commands::run::run(&ctx, args.interval, args.jobs),
        Command::Diff(args) => commands::diff::run(&ctx, args.target.as_deref()),
        Command::Status => commands::status::run(&ctx),
        Command::Validate => commands::validate::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pgconverge", &mut io::stdout());
            Ok(())
        }
    }
}
