// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the airlock CLI

pub mod config;
pub mod reclaim;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::reclaim::ReclaimCommand;
pub use self::run::RunCommand;

use anyhow::{Context, Result};

use airlock_core::domain::airlock_config::{AirlockConfig, RuntimeSelection};
use airlock_core::infrastructure::AirlockPaths;

/// Effective configuration for the current directory: global file, local
/// file, environment, then the `--runtime` flag if given.
pub fn load_config(paths: &AirlockPaths, runtime_flag: Option<&str>) -> Result<AirlockConfig> {
    let mut config = AirlockConfig::load_layered(&paths.global_config_dir, &paths.local_config_dir)
        .context("Failed to load configuration")?;

    if let Some(value) = runtime_flag {
        config.runtime = parse_runtime(value)?;
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub fn parse_runtime(value: &str) -> Result<RuntimeSelection> {
    RuntimeSelection::parse(value)
        .with_context(|| format!("Unknown runtime '{}'. Expected auto, docker or podman", value))
}
