// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Container engine executable the compose topology is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Arguments shared by every compose call of one session.
#[derive(Debug, Clone)]
pub struct ComposeInvocation {
    pub topology_path: PathBuf,
    pub project_name: String,
    /// Extra environment for the compose process (never written to disk).
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("{command} exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Unexpected output from {command}: {output}")]
    UnexpectedOutput { command: String, output: String },

    #[error("No container runtime found. Install docker or podman, or set AIRLOCK_RUNTIME")]
    NotFound,
}

impl RuntimeError {
    /// Diagnostic text suitable for showing the user verbatim.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RuntimeError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// The command failed only because the named container, network or volume
    /// does not exist. Docker and podman phrase this differently.
    pub fn is_missing_resource(&self) -> bool {
        let Some(stderr) = self.stderr() else {
            return false;
        };
        let stderr = stderr.to_lowercase();
        [
            "no such container",
            "no such network",
            "no such volume",
            "no such object",
            "no container with name or id",
            "no volume with name",
            "not found",
        ]
        .iter()
        .any(|marker| stderr.contains(marker))
    }
}

/// Operations the session controller and the orphan sweep need from the
/// container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// `compose -f <topology> -p <project> up -d proxy`
    async fn compose_up_proxy(&self, invocation: &ComposeInvocation) -> Result<(), RuntimeError>;

    /// `compose -f <topology> -p <project> run -i --rm app` with the host's
    /// stdio inherited. Returns the container's exit code.
    async fn compose_run_app(&self, invocation: &ComposeInvocation) -> Result<i32, RuntimeError>;

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;
    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError>;
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;
    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;

    /// Container names; `all` includes stopped containers.
    async fn list_containers(&self, all: bool) -> Result<Vec<String>, RuntimeError>;
    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError>;
    async fn network_container_count(&self, name: &str) -> Result<usize, RuntimeError>;
}
