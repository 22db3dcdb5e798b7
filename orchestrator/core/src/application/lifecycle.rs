// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Session lifecycle controller
//!
//! Drives one airlock session through its stages:
//!
//! ```text
//! ReclaimOrphans -> Generate -> StartProxy -> RunApp -> Teardown -> Done
//!                      |             |                     ^
//!                      +-------------+---------------------+  (on failure)
//! ```
//!
//! Teardown always runs, including when a stage panics; the panic is resumed
//! afterwards. Only stages before `RunApp` can fail the session; from `RunApp`
//! on the exit code is the application container's own.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::reclamation::{OrphanReclaimer, ReclamationReport};
use crate::application::teardown::{CleanupReport, TeardownPlan};
use crate::domain::mount::{dedupe_mounts, MountSpec};
use crate::domain::network_policy::{active_policy_path, POLICY_FILE_NAME};
use crate::domain::runtime::{ComposeInvocation, ContainerRuntime, RuntimeError};
use crate::domain::session::{ProjectName, Session};
use crate::infrastructure::paths::AirlockPaths;
use crate::infrastructure::policy_processor::{PolicyError, PolicyProcessor};
use crate::infrastructure::signals::{InterruptShield, TerminalTitle};
use crate::infrastructure::template_store::{TemplateError, TemplateStore};
use crate::infrastructure::topology_template::{TopologyError, TopologyGenerator, TopologyValues};

/// Environment variable carrying the auth token into compose.
pub const AUTH_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Exit code for any abort before the application container ran.
pub const ABORT_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    ReclaimOrphans,
    Generate,
    StartProxy,
    RunApp,
    Teardown,
    Done,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No network policy found. Enable airlock first by creating {local:?} (this project) or {global:?} (all projects)")]
    PolicyMissing { local: PathBuf, global: PathBuf },

    #[error(transparent)]
    TemplateUnavailable(TemplateError),

    #[error("Failed to process network policy: {0}")]
    PolicyProcessing(#[source] PolicyError),

    #[error("Failed to generate topology: {0}")]
    TopologyGeneration(#[source] TopologyError),

    #[error("Failed to start proxy container: {0}")]
    ProxyStart(#[source] RuntimeError),

    #[error("Failed to start application container: {0}")]
    AppStart(#[source] RuntimeError),
}

/// What the caller wants this session to run.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub mounts: Vec<MountSpec>,
    /// Arguments passed through to the agent (may start with the agent token).
    pub agent_args: Vec<String>,
    pub auth_token: Option<String>,
    /// Stop after Generate and return the rendered topology.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Forward Ctrl+C to the container and bracket the session with a
    /// terminal title. Off for tests and non-interactive callers.
    pub interactive_terminal: bool,
}

#[derive(Debug)]
pub struct SessionReport {
    pub project: ProjectName,
    /// Last stage entered before Teardown.
    pub stage_reached: SessionStage,
    pub exit_code: i32,
    pub error: Option<SessionError>,
    pub reclamation: ReclamationReport,
    pub teardown: CleanupReport,
    /// Rendered topology of a dry run.
    pub rendered_topology: Option<String>,
}

enum Completion {
    Exited(i32),
    DryRun(String),
}

/// Temporary artifacts and progress markers owned by one run.
#[derive(Default)]
struct SessionArtifacts {
    stage: Option<SessionStage>,
    topology_path: Option<PathBuf>,
    policy_path: Option<PathBuf>,
    proxy_attempted: bool,
    shield: Option<InterruptShield>,
}

impl SessionArtifacts {
    fn enter(&mut self, stage: SessionStage, project: &ProjectName) {
        info!(project = %project, stage = ?stage, "Entering session stage");
        self.stage = Some(stage);
    }

    fn files(&self) -> Vec<PathBuf> {
        self.topology_path
            .iter()
            .chain(self.policy_path.iter())
            .cloned()
            .collect()
    }
}

pub struct SessionController {
    runtime: Arc<dyn ContainerRuntime>,
    paths: AirlockPaths,
    template_store: TemplateStore,
    options: SessionOptions,
}

impl SessionController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        paths: AirlockPaths,
        template_store: TemplateStore,
        options: SessionOptions,
    ) -> Self {
        Self {
            runtime,
            paths,
            template_store,
            options,
        }
    }

    /// Run one session end to end. Never returns before Teardown finished.
    pub async fn run(&self, session: Session, request: SessionRequest) -> SessionReport {
        let _title = if self.options.interactive_terminal && !request.dry_run {
            TerminalTitle::set(&format!("airlock: {}", session.project))
        } else {
            TerminalTitle::disabled()
        };

        let mut artifacts = SessionArtifacts::default();
        artifacts.enter(SessionStage::ReclaimOrphans, &session.project);
        let reclamation = if request.dry_run {
            ReclamationReport::default()
        } else {
            OrphanReclaimer::new(self.runtime.clone()).reclaim().await
        };
        if !reclamation.errors.is_empty() {
            debug!(errors = ?reclamation.errors, "Orphan reclamation was incomplete");
        }

        let outcome = AssertUnwindSafe(self.drive(&session, &request, &mut artifacts))
            .catch_unwind()
            .await;

        let stage_reached = artifacts.stage.unwrap_or(SessionStage::ReclaimOrphans);
        artifacts.enter(SessionStage::Teardown, &session.project);
        let plan = if artifacts.proxy_attempted {
            TeardownPlan::for_session(&session.resources(), &artifacts.files())
        } else {
            TeardownPlan::files_only(&artifacts.files())
        };
        let teardown = plan.execute(self.runtime.as_ref()).await;
        if !teardown.is_clean() {
            debug!(failures = teardown.failures.len(), "Teardown left some resources behind");
        }
        // Stop listening once teardown is done; the handler stays installed.
        artifacts.shield.take();
        artifacts.enter(SessionStage::Done, &session.project);

        let completion = match outcome {
            Ok(completion) => completion,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        let (exit_code, error, rendered_topology) = match completion {
            Ok(Completion::Exited(code)) => (code, None, None),
            Ok(Completion::DryRun(document)) => (0, None, Some(document)),
            Err(e) => {
                warn!(project = %session.project, "Session aborted: {}", e);
                (ABORT_EXIT_CODE, Some(e), None)
            }
        };

        SessionReport {
            project: session.project,
            stage_reached,
            exit_code,
            error,
            reclamation,
            teardown,
            rendered_topology,
        }
    }

    async fn drive(
        &self,
        session: &Session,
        request: &SessionRequest,
        artifacts: &mut SessionArtifacts,
    ) -> Result<Completion, SessionError> {
        artifacts.enter(SessionStage::Generate, &session.project);

        let local_dir = &self.paths.local_config_dir;
        let global_dir = &self.paths.global_config_dir;
        let rules_path = active_policy_path(local_dir, global_dir)
            .ok_or_else(|| SessionError::PolicyMissing {
                local: local_dir.join(POLICY_FILE_NAME),
                global: global_dir.join(POLICY_FILE_NAME),
            })?;
        debug!("Active network policy: {:?}", rules_path);

        let template_path = self
            .template_store
            .get_or_fetch()
            .await
            .map_err(SessionError::TemplateUnavailable)?;

        let policy = PolicyProcessor::new(self.paths.tmp_dir())
            .process(&rules_path, &self.paths.work_dir, &session.id)
            .map_err(SessionError::PolicyProcessing)?;
        artifacts.policy_path = Some(policy.path.clone());

        // Pre-create so the runtime does not create it root-owned.
        let agent_config = self.paths.agent_config_dir();
        if let Err(e) = std::fs::create_dir_all(&agent_config) {
            warn!("Could not create agent config directory {:?}: {}", agent_config, e);
        }

        let mounts = dedupe_mounts(
            request.mounts.clone(),
            &self.paths.work_dir,
            &self.paths.home_dir,
        );
        let values = TopologyValues::for_session(
            session,
            &self.paths,
            &policy,
            &mounts,
            &request.agent_args,
        );
        let topology_path = TopologyGenerator::new(self.paths.tmp_dir())
            .generate(&template_path, &values, session.id.as_str())
            .map_err(SessionError::TopologyGeneration)?;
        artifacts.topology_path = Some(topology_path.clone());

        if request.dry_run {
            let document = std::fs::read_to_string(&topology_path).map_err(|source| {
                SessionError::TopologyGeneration(TopologyError::Read {
                    path: topology_path.clone(),
                    source,
                })
            })?;
            return Ok(Completion::DryRun(document));
        }

        let invocation = ComposeInvocation {
            topology_path,
            project_name: session.project.to_string(),
            env: request
                .auth_token
                .iter()
                .map(|token| (AUTH_TOKEN_ENV.to_string(), token.clone()))
                .collect(),
        };

        artifacts.enter(SessionStage::StartProxy, &session.project);
        artifacts.proxy_attempted = true;
        self.runtime
            .compose_up_proxy(&invocation)
            .await
            .map_err(SessionError::ProxyStart)?;

        artifacts.enter(SessionStage::RunApp, &session.project);
        if self.options.interactive_terminal {
            artifacts.shield = Some(InterruptShield::engage());
        }
        let code = self
            .runtime
            .compose_run_app(&invocation)
            .await
            .map_err(SessionError::AppStart)?;

        Ok(Completion::Exited(code))
    }
}
