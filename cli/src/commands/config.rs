// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, clear-template

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use airlock_core::domain::network_policy::active_policy_path;
use airlock_core::infrastructure::template_store::TemplateStore;
use airlock_core::infrastructure::{AirlockPaths, CliContainerRuntime};

use super::load_config;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show {
        /// Show resolved directories and files
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration files
    Validate,

    /// Delete the cached topology template so the next session downloads it again
    ClearTemplate,
}

pub async fn handle_command(command: ConfigCommand) -> Result<()> {
    let paths = AirlockPaths::discover()?;
    match command {
        ConfigCommand::Show { paths: show_paths } => show(&paths, show_paths),
        ConfigCommand::Validate => validate(&paths),
        ConfigCommand::ClearTemplate => clear_template(&paths),
    }
}

fn show(paths: &AirlockPaths, show_paths: bool) -> Result<()> {
    let config = load_config(paths, None)?;

    if show_paths {
        println!("{}", "Resolved paths:".bold());
        println!("  Global config: {}", paths.global_config_dir.display());
        println!("  Local config:  {}", paths.local_config_dir.display());
        match active_policy_path(&paths.local_config_dir, &paths.global_config_dir) {
            Some(policy) => println!("  Network policy: {}", policy.display()),
            None => println!("  Network policy: {}", "(none - sessions will not start)".yellow()),
        }
        let template = paths.template_cache_path();
        if template.is_file() {
            println!("  Template cache: {}", template.display());
        } else {
            println!("  Template cache: {}", "(not downloaded yet)".dimmed());
        }
        match CliContainerRuntime::detect(config.runtime) {
            Ok(runtime) => println!("  Runtime: {}", runtime.kind()),
            Err(e) => println!("  Runtime: {}", e.to_string().yellow()),
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();
    print!("{}", config.to_yaml_string().context("Failed to render configuration")?);

    Ok(())
}

fn validate(paths: &AirlockPaths) -> Result<()> {
    println!("Validating configuration...");
    load_config(paths, None)?;
    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn clear_template(paths: &AirlockPaths) -> Result<()> {
    let config = load_config(paths, None)?;
    let store = TemplateStore::new(config.template_url, paths.template_cache_path());
    store
        .clear_cache()
        .with_context(|| format!("Failed to delete {:?}", store.cache_path()))?;
    println!("{}", "✓ Template cache cleared".green());
    Ok(())
}
