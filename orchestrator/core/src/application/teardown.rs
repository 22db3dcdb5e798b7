// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Session teardown
//!
//! Every resource a session may have created is removed by an independent
//! cleanup action. Actions run in dependency order (containers, networks,
//! volume, files) and each failure is recorded without stopping the rest.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Best-effort removal of session-scoped resources

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::runtime::{ContainerRuntime, RuntimeError};
use crate::domain::session::ResourceNames;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    StopContainer(String),
    RemoveContainer(String),
    RemoveNetwork(String),
    RemoveVolume(String),
    RemoveFile(PathBuf),
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupAction::StopContainer(name) => write!(f, "stop container {}", name),
            CleanupAction::RemoveContainer(name) => write!(f, "remove container {}", name),
            CleanupAction::RemoveNetwork(name) => write!(f, "remove network {}", name),
            CleanupAction::RemoveVolume(name) => write!(f, "remove volume {}", name),
            CleanupAction::RemoveFile(path) => write!(f, "delete {}", path.display()),
        }
    }
}

/// Outcome of a teardown. Failures never propagate as errors.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub attempted: Vec<CleanupAction>,
    pub failures: Vec<(CleanupAction, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeardownPlan {
    actions: Vec<CleanupAction>,
}

impl TeardownPlan {
    /// Full teardown: proxy container, both networks, the CA volume, then
    /// the scratch files.
    pub fn for_session(names: &ResourceNames, files: &[PathBuf]) -> Self {
        let mut actions = vec![
            CleanupAction::StopContainer(names.proxy_container.clone()),
            CleanupAction::RemoveContainer(names.proxy_container.clone()),
            CleanupAction::RemoveNetwork(names.airlock_network.clone()),
            CleanupAction::RemoveNetwork(names.bridge_network.clone()),
            CleanupAction::RemoveVolume(names.proxy_ca_volume.clone()),
        ];
        actions.extend(files.iter().cloned().map(CleanupAction::RemoveFile));
        Self { actions }
    }

    /// Nothing reached the runtime yet; only scratch files can exist.
    pub fn files_only(files: &[PathBuf]) -> Self {
        Self {
            actions: files.iter().cloned().map(CleanupAction::RemoveFile).collect(),
        }
    }

    pub fn actions(&self) -> &[CleanupAction] {
        &self.actions
    }

    /// Attempt every action; collect errors, never propagate. Resources that
    /// are already gone count as removed.
    pub async fn execute(&self, runtime: &dyn ContainerRuntime) -> CleanupReport {
        let mut report = CleanupReport::default();

        for action in &self.actions {
            report.attempted.push(action.clone());
            let result = match action {
                CleanupAction::RemoveFile(path) => {
                    remove_file_if_exists(path).map_err(|e| e.to_string())
                }
                _ => ignore_missing(run_runtime_action(action, runtime).await),
            };

            if let Err(e) = result {
                debug!(action = %action, "Cleanup step failed: {}", e);
                report.failures.push((action.clone(), e));
            }
        }

        report
    }
}

async fn run_runtime_action(
    action: &CleanupAction,
    runtime: &dyn ContainerRuntime,
) -> Result<(), RuntimeError> {
    match action {
        CleanupAction::StopContainer(name) => runtime.stop_container(name).await,
        CleanupAction::RemoveContainer(name) => runtime.remove_container(name, true).await,
        CleanupAction::RemoveNetwork(name) => runtime.remove_network(name).await,
        CleanupAction::RemoveVolume(name) => runtime.remove_volume(name).await,
        CleanupAction::RemoveFile(_) => Ok(()),
    }
}

fn ignore_missing(result: Result<(), RuntimeError>) -> Result<(), String> {
    match result {
        Err(e) if e.is_missing_resource() => {
            debug!("Already gone: {}", e);
            Ok(())
        }
        other => other.map_err(|e| e.to_string()),
    }
}

fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
