// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stand-alone orphan reclamation
//!
//! Removes proxy containers and networks left behind by sessions that were
//! killed before they could tear down. Every session runs the same sweep
//! before starting.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use airlock_core::application::reclamation::OrphanReclaimer;
use airlock_core::infrastructure::{AirlockPaths, CliContainerRuntime};

use super::load_config;

#[derive(Args)]
pub struct ReclaimCommand {
    /// Container runtime: auto, docker or podman
    #[arg(long, value_name = "RUNTIME")]
    runtime: Option<String>,
}

pub async fn execute(cmd: ReclaimCommand) -> Result<()> {
    let paths = AirlockPaths::discover()?;
    let config = load_config(&paths, cmd.runtime.as_deref())?;
    let runtime = CliContainerRuntime::detect(config.runtime).context("Cannot reclaim resources")?;

    let report = OrphanReclaimer::new(Arc::new(runtime)).reclaim().await;

    if !report.removed_anything() {
        println!("{}", "No orphaned session resources found".dimmed());
    }
    for container in &report.removed_containers {
        println!("{} Removed container {}", "✓".green(), container);
    }
    for network in &report.removed_networks {
        println!("{} Removed network {}", "✓".green(), network);
    }
    for error in &report.errors {
        eprintln!("{} {}", "⚠".yellow(), error);
    }

    Ok(())
}
