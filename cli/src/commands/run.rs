// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Run Command
//!
//! This module implements `airlock run`, which starts one agent session in
//! the current directory.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session with the banner
//! airlock run
//!
//! # Unattended session with extra mounts, arguments passed to the agent
//! airlock run --yolo --mount ~/notes --mount-rw ~/scratch -- -p "fix the build" --model gpt-5
//!
//! # Resume the previous conversation
//! airlock run -- --resume
//!
//! # Print the rendered topology without starting containers
//! airlock run --dry-run
//! ```
//!
//! Agent arguments count toward the interactive heuristic together with the
//! agent's own name: `copilot` plus one argument, or plus up to two in yolo
//! mode, still opens the banner.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tracing::debug;

use airlock_core::application::lifecycle::{
    SessionController, SessionError, SessionOptions, SessionRequest,
};
use airlock_core::domain::agent_command::AGENT_COMMAND;
use airlock_core::domain::mount::{MountSource, MountSpec};
use airlock_core::domain::runtime::RuntimeKind;
use airlock_core::domain::session::{Session, SessionId};
use airlock_core::infrastructure::template_store::TemplateStore;
use airlock_core::infrastructure::{AirlockPaths, CliContainerRuntime};

use super::load_config;

#[derive(Args)]
pub struct RunCommand {
    /// Let the agent use every tool and path without asking
    #[arg(long)]
    yolo: bool,

    /// Extra read-only mount: PATH[:CONTAINER_PATH][:ro|rw]
    #[arg(long = "mount", value_name = "SPEC")]
    mounts: Vec<String>,

    /// Extra read-write mount: PATH[:CONTAINER_PATH]
    #[arg(long = "mount-rw", value_name = "SPEC")]
    mounts_rw: Vec<String>,

    /// Image tag for both containers (overrides configuration)
    #[arg(long, value_name = "TAG")]
    tag: Option<String>,

    /// Container runtime: auto, docker or podman
    #[arg(long, value_name = "RUNTIME")]
    runtime: Option<String>,

    /// Token passed to the agent container
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Render the topology and print it without starting containers
    #[arg(long)]
    dry_run: bool,

    /// Arguments passed through to the agent
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "AGENT_ARGS")]
    agent_args: Vec<String>,
}

impl RunCommand {
    fn mount_specs(&self) -> Result<Vec<MountSpec>> {
        let read_only = self.mounts.iter().map(|spec| (spec, false));
        let read_write = self.mounts_rw.iter().map(|spec| (spec, true));

        read_only
            .chain(read_write)
            .map(|(spec, rw)| {
                MountSpec::parse(spec, MountSource::CommandLine, rw)
                    .with_context(|| format!("Invalid mount '{}'", spec))
            })
            .collect()
    }

    /// The agent command line as the user would type it: `copilot ARGS..`.
    fn caller_args(&self) -> Vec<String> {
        std::iter::once(AGENT_COMMAND.to_string())
            .chain(self.agent_args.iter().cloned())
            .collect()
    }
}

/// Run one session; returns the process exit code.
pub async fn execute(cmd: RunCommand) -> Result<i32> {
    let paths = AirlockPaths::discover()?;
    let mut config = load_config(&paths, cmd.runtime.as_deref())?;
    if let Some(tag) = &cmd.tag {
        config.image_tag = tag.clone();
        config.validate().context("Invalid --tag")?;
    }

    let mut mounts = config.mount_specs();
    mounts.extend(cmd.mount_specs()?);

    let runtime = match CliContainerRuntime::detect(config.runtime) {
        Ok(runtime) => runtime,
        Err(e) if cmd.dry_run => {
            debug!("No runtime needed for a dry run: {}", e);
            CliContainerRuntime::new(RuntimeKind::Docker, RuntimeKind::Docker.binary())
        }
        Err(e) => return Err(e).context("Cannot start a session"),
    };

    let session = Session::new(
        SessionId::generate(),
        &paths.work_dir_name(),
        config.app_image_ref(),
        config.proxy_image_ref(),
        cmd.yolo,
    );
    debug!(project = %session.project, runtime = %runtime.kind(), "Prepared session");

    let store = TemplateStore::new(config.template_url.clone(), paths.template_cache_path());
    let options = SessionOptions {
        interactive_terminal: !cmd.dry_run,
    };
    let controller = SessionController::new(Arc::new(runtime), paths, store, options);

    let request = SessionRequest {
        mounts,
        agent_args: cmd.caller_args(),
        auth_token: cmd.token.filter(|t| !t.trim().is_empty()),
        dry_run: cmd.dry_run,
    };
    let report = controller.run(session, request).await;

    if let Some(document) = &report.rendered_topology {
        print!("{}", document);
    }

    if let Some(error) = &report.error {
        eprintln!("{} {}", "✗".red(), error.to_string().red());
        if let SessionError::PolicyMissing { .. } = error {
            eprintln!(
                "  {}",
                "Create a network.json policy to declare which hosts the agent may reach.".yellow()
            );
        }
    }

    if !report.teardown.is_clean() {
        debug!(
            failures = report.teardown.failures.len(),
            "Some session resources were already gone or could not be removed"
        );
    }

    Ok(report.exit_code)
}
