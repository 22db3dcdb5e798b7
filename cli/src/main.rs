// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Airlock CLI
//!
//! The `airlock` binary runs a coding agent in a container whose only way out
//! is a proxy enforcing the project's network policy.
//!
//! ## Commands
//!
//! - `airlock run [--yolo] [--mount ..] [-- AGENT_ARGS]` - Run one agent session
//! - `airlock reclaim` - Remove resources left behind by killed sessions
//! - `airlock config show|validate` - Configuration management

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{ConfigCommand, ReclaimCommand, RunCommand};

/// Airlock - run a coding agent behind a policy-enforcing proxy
#[derive(Parser)]
#[command(name = "airlock")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AIRLOCK_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(
        long,
        global = true,
        env = "AIRLOCK_DEBUG",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent session in the current directory
    #[command(name = "run")]
    Run(RunCommand),

    /// Remove orphaned session containers and networks
    #[command(name = "reclaim")]
    Reclaim(ReclaimCommand),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { cli.log_level.as_str() };
    init_logging(level)?;

    match cli.command {
        Some(Commands::Run(command)) => {
            let code = commands::run::execute(command).await?;
            std::process::exit(code);
        }
        Some(Commands::Reclaim(command)) => commands::reclaim::execute(command).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging.
///
/// Output goes to stderr; stdout belongs to the agent session.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
