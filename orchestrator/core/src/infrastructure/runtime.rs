// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::airlock_config::RuntimeSelection;
use crate::domain::runtime::{ComposeInvocation, ContainerRuntime, RuntimeError, RuntimeKind};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime driven through the docker/podman command line.
pub struct CliContainerRuntime {
    kind: RuntimeKind,
    binary: PathBuf,
}

impl CliContainerRuntime {
    pub fn new(kind: RuntimeKind, binary: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
        }
    }

    /// Locate the runtime executable on PATH. `Auto` prefers docker.
    pub fn detect(selection: RuntimeSelection) -> Result<Self, RuntimeError> {
        let candidates: &[RuntimeKind] = match selection.fixed() {
            Some(RuntimeKind::Docker) => &[RuntimeKind::Docker],
            Some(RuntimeKind::Podman) => &[RuntimeKind::Podman],
            None => &[RuntimeKind::Docker, RuntimeKind::Podman],
        };

        for kind in candidates {
            if let Ok(path) = which::which(kind.binary()) {
                info!("Using container runtime {} at {:?}", kind, path);
                return Ok(Self::new(*kind, path));
            }
            debug!("{} not found on PATH", kind);
        }

        Err(RuntimeError::NotFound)
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.kind.binary().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compose_args(invocation: &ComposeInvocation) -> Vec<String> {
        vec![
            "compose".to_string(),
            "-f".to_string(),
            invocation.topology_path.to_string_lossy().into_owned(),
            "-p".to_string(),
            invocation.project_name.clone(),
        ]
    }

    /// Run to completion with captured output; non-zero exit becomes
    /// `CommandFailed` carrying stderr.
    async fn output(
        &self,
        args: Vec<String>,
        env: &[(String, String)],
    ) -> Result<String, RuntimeError> {
        let command = self.command_line(&args);
        debug!(command = %command, "Invoking container runtime");

        let output = Command::new(&self.binary)
            .args(&args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RuntimeError::SpawnFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                status: exit_code(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn names(&self, args: Vec<String>) -> Result<Vec<String>, RuntimeError> {
        let stdout = self.output(args, &[]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Exit code of a finished child; signal deaths map to `128 + signal` on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ContainerRuntime for CliContainerRuntime {
    async fn compose_up_proxy(&self, invocation: &ComposeInvocation) -> Result<(), RuntimeError> {
        let mut argv = Self::compose_args(invocation);
        argv.extend(args(&["up", "-d", "proxy"]));
        self.output(argv, &invocation.env).await?;
        info!(project = %invocation.project_name, "Proxy container started");
        Ok(())
    }

    async fn compose_run_app(&self, invocation: &ComposeInvocation) -> Result<i32, RuntimeError> {
        let mut argv = Self::compose_args(invocation);
        argv.extend(args(&["run", "-i", "--rm", "app"]));
        let command = self.command_line(&argv);
        debug!(command = %command, "Starting interactive application container");

        let status = Command::new(&self.binary)
            .args(&argv)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| RuntimeError::SpawnFailed {
                command,
                message: e.to_string(),
            })?;

        let code = exit_code(status);
        info!(project = %invocation.project_name, exit_code = code, "Application container exited");
        Ok(code)
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.output(args(&["stop", name]), &[]).await.map(|_| ())
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let argv = if force {
            args(&["rm", "-f", name])
        } else {
            args(&["rm", name])
        };
        self.output(argv, &[]).await.map(|_| ())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.output(args(&["network", "rm", name]), &[]).await.map(|_| ())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.output(args(&["volume", "rm", name]), &[]).await.map(|_| ())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<String>, RuntimeError> {
        let argv = if all {
            args(&["ps", "-a", "--format", "{{.Names}}"])
        } else {
            args(&["ps", "--format", "{{.Names}}"])
        };
        self.names(argv).await
    }

    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        self.names(args(&["network", "ls", "--format", "{{.Name}}"])).await
    }

    async fn network_container_count(&self, name: &str) -> Result<usize, RuntimeError> {
        let argv = args(&["network", "inspect", name, "--format", "{{len .Containers}}"]);
        let command = self.command_line(&argv);
        let stdout = self.output(argv, &[]).await?;
        parse_count(&stdout).ok_or(RuntimeError::UnexpectedOutput {
            command,
            output: stdout.trim().to_string(),
        })
    }
}

/// First non-empty line parsed as a count.
fn parse_count(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse().ok())
}
