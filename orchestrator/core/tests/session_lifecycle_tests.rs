// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the session lifecycle controller.
//!
//! A recording `MockRuntime` stands in for docker/podman. It keeps a small
//! model of containers and networks so teardown and orphan reclamation act on
//! observable state.

use airlock_core::application::lifecycle::{
    SessionController, SessionError, SessionOptions, SessionReport, SessionRequest, SessionStage,
};
use airlock_core::application::reclamation::OrphanReclaimer;
use airlock_core::application::teardown::CleanupAction;
use airlock_core::domain::mount::{MountSource, MountSpec};
use airlock_core::domain::runtime::{ComposeInvocation, ContainerRuntime, RuntimeError};
use airlock_core::domain::session::{Session, SessionId};
use airlock_core::infrastructure::paths::AirlockPaths;
use airlock_core::infrastructure::template_store::TemplateStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TEMPLATE: &str = include_str!("../../../templates/docker-compose.airlock.yml.template");
const ENFORCE_POLICY: &str =
    r#"{"enabled": true, "mode": "enforce", "allowed_rules": [{"host": "api.github.com"}]}"#;

#[derive(Default)]
struct RuntimeState {
    /// (name, running)
    containers: Vec<(String, bool)>,
    networks: Vec<String>,
    volumes: Vec<String>,
}

#[derive(Default)]
struct MockRuntime {
    state: Mutex<RuntimeState>,
    calls: Mutex<Vec<String>>,
    proxy_failure: Option<String>,
    app_exit_code: i32,
    panic_in_app: bool,
    compose_env: Mutex<Vec<(String, String)>>,
    rendered_topology: Mutex<Option<String>>,
}

impl MockRuntime {
    fn with_exit_code(code: i32) -> Self {
        Self {
            app_exit_code: code,
            ..Default::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    fn missing(command: &str, name: &str) -> RuntimeError {
        RuntimeError::CommandFailed {
            command: command.to_string(),
            status: 1,
            stderr: format!("Error: No such object: {}", name),
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn compose_up_proxy(&self, invocation: &ComposeInvocation) -> Result<(), RuntimeError> {
        self.record("compose up proxy");
        *self.compose_env.lock().unwrap() = invocation.env.clone();
        let topology = std::fs::read_to_string(&invocation.topology_path).ok();
        *self.rendered_topology.lock().unwrap() = topology;

        if let Some(stderr) = &self.proxy_failure {
            return Err(RuntimeError::CommandFailed {
                command: "docker compose up".to_string(),
                status: 1,
                stderr: stderr.clone(),
            });
        }

        let project = &invocation.project_name;
        let mut state = self.state.lock().unwrap();
        state.containers.push((format!("{}-proxy", project), true));
        state.networks.push(format!("{}_airlock", project));
        state.networks.push(format!("{}_bridge", project));
        state.volumes.push(format!("{}_proxy-ca", project));
        Ok(())
    }

    async fn compose_run_app(&self, _invocation: &ComposeInvocation) -> Result<i32, RuntimeError> {
        self.record("compose run app");
        if self.panic_in_app {
            panic!("runtime adapter bug");
        }
        Ok(self.app_exit_code)
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("stop {}", name));
        let mut state = self.state.lock().unwrap();
        match state.containers.iter_mut().find(|(n, _)| n == name) {
            Some(container) => {
                container.1 = false;
                Ok(())
            }
            None => Err(Self::missing("stop", name)),
        }
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        self.record(if force { format!("rm -f {}", name) } else { format!("rm {}", name) });
        let mut state = self.state.lock().unwrap();
        let before = state.containers.len();
        state.containers.retain(|(n, _)| n != name);
        if state.containers.len() == before {
            return Err(Self::missing("rm", name));
        }
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("network rm {}", name));
        let mut state = self.state.lock().unwrap();
        let before = state.networks.len();
        state.networks.retain(|n| n != name);
        if state.networks.len() == before {
            return Err(Self::missing("network rm", name));
        }
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("volume rm {}", name));
        let mut state = self.state.lock().unwrap();
        let before = state.volumes.len();
        state.volumes.retain(|n| n != name);
        if state.volumes.len() == before {
            return Err(Self::missing("volume rm", name));
        }
        Ok(())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<String>, RuntimeError> {
        self.record(if all { "ps -a" } else { "ps" });
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|(_, running)| all || *running)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        self.record("network ls");
        Ok(self.state.lock().unwrap().networks.clone())
    }

    async fn network_container_count(&self, name: &str) -> Result<usize, RuntimeError> {
        self.record(format!("network inspect {}", name));
        let project = name.rsplit_once('_').map(|(p, _)| p).unwrap_or(name);
        let prefix = format!("{}-", project);
        let state = self.state.lock().unwrap();
        Ok(state.containers.iter().filter(|(n, _)| n.starts_with(&prefix)).count())
    }
}

struct Fixture {
    _root: TempDir,
    paths: AirlockPaths,
}

/// Home, global config and a `demo` project directory under a temp root, with
/// the template already cached so no download happens.
fn fixture(global_policy: Option<&str>) -> Fixture {
    fixture_with_template(global_policy, Some(TEMPLATE))
}

/// Like [`fixture`]; `None` leaves the template cache empty.
fn fixture_with_template(global_policy: Option<&str>, template: Option<&str>) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let home = root.path().join("home");
    let global = home.join(".config").join("airlock");
    let work = home.join("projects").join("demo");
    std::fs::create_dir_all(&global).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    let paths = AirlockPaths::new(&home, &global, &work);
    if let Some(template) = template {
        std::fs::write(paths.template_cache_path(), template).unwrap();
    }
    if let Some(policy) = global_policy {
        std::fs::write(global.join("network.json"), policy).unwrap();
    }

    Fixture { _root: root, paths }
}

fn controller(runtime: Arc<MockRuntime>, paths: &AirlockPaths) -> SessionController {
    let store = TemplateStore::new("http://127.0.0.1:1/unreachable", paths.template_cache_path());
    SessionController::new(runtime, paths.clone(), store, SessionOptions::default())
}

fn demo_session() -> Session {
    Session::new(SessionId::new("abc12345"), "demo", "app:latest", "proxy:latest", false)
}

fn scratch_files(paths: &AirlockPaths) -> Vec<String> {
    match std::fs::read_dir(paths.tmp_dir()) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_exit_code_of_app_container_is_propagated() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::with_exit_code(42));

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.exit_code, 42);
    assert!(report.error.is_none());
    assert_eq!(report.stage_reached, SessionStage::RunApp);
    assert_eq!(report.project.as_str(), "demo-abc12345");

    let up = runtime.position("compose up proxy").unwrap();
    let run = runtime.position("compose run app").unwrap();
    let stop = runtime.position("stop demo-abc12345-proxy").unwrap();
    assert!(up < run && run < stop);

    // Every session resource is gone and nothing failed to clean up.
    assert!(report.teardown.is_clean(), "{:?}", report.teardown.failures);
    let state = runtime.state.lock().unwrap();
    assert!(state.containers.is_empty());
    assert!(state.networks.is_empty());
    assert!(state.volumes.is_empty());
    drop(state);
    assert!(scratch_files(&fx.paths).is_empty());
}

#[tokio::test]
async fn test_nonzero_exit_is_not_a_failure() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::with_exit_code(130));

    let report = controller(runtime, &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.exit_code, 130);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_missing_policy_aborts_before_any_container_work() {
    let fx = fixture(None);
    let runtime = Arc::new(MockRuntime::default());

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.stage_reached, SessionStage::Generate);
    let error = report.error.expect("missing policy must abort");
    assert!(matches!(error, SessionError::PolicyMissing { .. }));
    assert!(error.to_string().contains("network.json"));

    assert!(runtime.position("compose up proxy").is_none());
    assert!(report.teardown.attempted.is_empty());
}

/// Shared checks for an abort in the Generate stage: exit 1, no container
/// started, runtime untouched by teardown and no scratch file left behind.
fn assert_generate_abort(report: &SessionReport, runtime: &MockRuntime, paths: &AirlockPaths) {
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.stage_reached, SessionStage::Generate);
    assert!(runtime.position("compose up proxy").is_none());
    assert!(runtime.position("compose run app").is_none());
    assert!(runtime.position("stop demo-abc12345-proxy").is_none());
    assert!(report
        .teardown
        .attempted
        .iter()
        .all(|action| matches!(action, CleanupAction::RemoveFile(_))));
    assert!(report.teardown.is_clean(), "{:?}", report.teardown.failures);
    assert!(scratch_files(paths).is_empty());
}

#[tokio::test]
async fn test_unavailable_template_aborts_generate() {
    let fx = fixture_with_template(Some(ENFORCE_POLICY), None);
    let runtime = Arc::new(MockRuntime::default());

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_generate_abort(&report, &runtime, &fx.paths);
    let error = report.error.as_ref().expect("template download must abort");
    assert!(matches!(error, SessionError::TemplateUnavailable(_)));
    assert!(error.to_string().contains("failed to download topology template"));
    assert!(!fx.paths.template_cache_path().exists());
}

#[tokio::test]
async fn test_unwritable_scratch_dir_aborts_policy_processing() {
    let fx = fixture(Some(ENFORCE_POLICY));
    // A plain file where the scratch directory should be.
    std::fs::write(fx.paths.tmp_dir(), "not a directory").unwrap();
    let runtime = Arc::new(MockRuntime::default());

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_generate_abort(&report, &runtime, &fx.paths);
    let error = report.error.as_ref().expect("policy processing must abort");
    assert!(matches!(error, SessionError::PolicyProcessing(_)));
    assert!(report.teardown.attempted.is_empty());
    assert_eq!(std::fs::read_to_string(fx.paths.tmp_dir()).unwrap(), "not a directory");
}

#[tokio::test]
async fn test_topology_failure_removes_processed_policy() {
    let template = format!("# {{{{PROJECT_NAME}}}} topology\n{}", TEMPLATE);
    let fx = fixture_with_template(Some(ENFORCE_POLICY), Some(&template));
    let runtime = Arc::new(MockRuntime::default());

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_generate_abort(&report, &runtime, &fx.paths);
    let error = report.error.as_ref().expect("topology generation must abort");
    assert!(matches!(error, SessionError::TopologyGeneration(_)));

    // The processed policy was written before rendering failed, then deleted.
    assert_eq!(report.teardown.attempted.len(), 1);
    match &report.teardown.attempted[0] {
        CleanupAction::RemoveFile(path) => {
            assert!(path.starts_with(fx.paths.tmp_dir()));
            assert!(!path.exists());
        }
        other => panic!("unexpected cleanup action: {other}"),
    }
    assert!(fx.paths.tmp_dir().is_dir());
}

#[tokio::test]
async fn test_local_policy_supersedes_global() {
    let fx = fixture(Some(r#"{"enabled": true, "mode": "monitor"}"#));
    std::fs::create_dir_all(&fx.paths.local_config_dir).unwrap();
    std::fs::write(fx.paths.local_config_dir.join("network.json"), ENFORCE_POLICY).unwrap();
    let runtime = Arc::new(MockRuntime::default());

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.exit_code, 0);
    let topology = runtime.rendered_topology.lock().unwrap().clone().unwrap();
    // The global monitor-mode policy would have added the logs mount.
    assert!(!topology.contains("/var/log/airlock"));
    assert!(!fx.paths.global_config_dir.join("logs").exists());
}

#[tokio::test]
async fn test_proxy_failure_still_attempts_full_teardown() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime {
        proxy_failure: Some("Bind for 0.0.0.0:8080 failed: port is already allocated".to_string()),
        ..Default::default()
    });

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.stage_reached, SessionStage::StartProxy);
    let error = report.error.expect("proxy failure must abort");
    assert!(matches!(error, SessionError::ProxyStart(_)));
    assert!(error.to_string().contains("port is already allocated"));
    assert!(runtime.position("compose run app").is_none());

    let names = [
        "stop demo-abc12345-proxy",
        "rm -f demo-abc12345-proxy",
        "network rm demo-abc12345_airlock",
        "network rm demo-abc12345_bridge",
        "volume rm demo-abc12345_proxy-ca",
    ];
    for call in names {
        assert!(runtime.position(call).is_some(), "teardown skipped `{}`", call);
    }

    // Nothing existed; removing an absent resource is not a failure.
    assert_eq!(report.teardown.attempted.len(), 7);
    assert!(report.teardown.is_clean(), "{:?}", report.teardown.failures);
    let files_removed = report
        .teardown
        .attempted
        .iter()
        .filter(|action| matches!(action, CleanupAction::RemoveFile(_)))
        .count();
    assert_eq!(files_removed, 2);
    assert!(scratch_files(&fx.paths).is_empty());
}

#[tokio::test]
async fn test_panic_in_app_stage_still_tears_down() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime {
        panic_in_app: true,
        ..Default::default()
    });
    let controller = controller(runtime.clone(), &fx.paths);

    let outcome = tokio::spawn(async move {
        controller.run(demo_session(), SessionRequest::default()).await
    })
    .await;

    assert!(outcome.unwrap_err().is_panic());
    assert!(runtime.position("rm -f demo-abc12345-proxy").is_some());
    assert!(runtime.position("volume rm demo-abc12345_proxy-ca").is_some());
    assert!(scratch_files(&fx.paths).is_empty());
}

#[tokio::test]
async fn test_token_reaches_compose_env_only() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::default());
    let request = SessionRequest {
        auth_token: Some("ghp_secret123".to_string()),
        ..Default::default()
    };

    controller(runtime.clone(), &fx.paths).run(demo_session(), request).await;

    let env = runtime.compose_env.lock().unwrap().clone();
    assert_eq!(env, vec![("GITHUB_TOKEN".to_string(), "ghp_secret123".to_string())]);
    let topology = runtime.rendered_topology.lock().unwrap().clone().unwrap();
    assert!(!topology.contains("ghp_secret123"));
}

#[tokio::test]
async fn test_topology_carries_mounts_and_agent_command() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::default());
    let notes = fx.paths.home_dir.join("notes");
    let request = SessionRequest {
        mounts: vec![MountSpec::read_write(notes.to_string_lossy(), MountSource::CommandLine)],
        agent_args: ["-p", "cost $5", "--model", "gpt-5"]
            .iter()
            .map(|a| a.to_string())
            .collect(),
        ..Default::default()
    };
    let session = Session::new(
        SessionId::new("abc12345"),
        "demo",
        "app:latest",
        "proxy:latest",
        true,
    );

    controller(runtime.clone(), &fx.paths).run(session, request).await;

    let topology = runtime.rendered_topology.lock().unwrap().clone().unwrap();
    assert!(topology.contains(":/home/appuser/notes:rw"));
    assert!(topology.contains("working_dir: /home/appuser/projects/demo"));
    assert!(topology.contains(
        r#"command: ["copilot","--allow-all-tools","--allow-all-paths","--add-dir","/home/appuser/projects/demo","-p","cost $$5","--model","gpt-5"]"#
    ));
}

#[tokio::test]
async fn test_audit_logging_policy_mounts_log_directory() {
    let fx = fixture(Some(r#"{"enabled": true, "mode": "enforce", "enable_logging": true}"#));
    let runtime = Arc::new(MockRuntime::default());

    controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    let logs = fx.paths.global_config_dir.join("logs");
    let ignore = std::fs::read_to_string(logs.join(".gitignore")).unwrap();
    assert!(ignore.lines().any(|l| l == "*"));
    let topology = runtime.rendered_topology.lock().unwrap().clone().unwrap();
    assert!(topology.contains(":/var/log/airlock:rw"));
}

#[tokio::test]
async fn test_dry_run_renders_without_touching_the_runtime() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::default());
    let request = SessionRequest {
        dry_run: true,
        ..Default::default()
    };

    let report = controller(runtime.clone(), &fx.paths).run(demo_session(), request).await;

    assert_eq!(report.exit_code, 0);
    let rendered = report.rendered_topology.expect("dry run returns the document");
    assert!(rendered.contains("container_name: demo-abc12345-proxy"));
    assert!(runtime.position("compose up proxy").is_none());
    assert!(runtime.position("stop demo-abc12345-proxy").is_none());
    assert!(runtime.position("ps -a").is_none());
    assert!(scratch_files(&fx.paths).is_empty());
}

#[tokio::test]
async fn test_orphan_reclamation_is_idempotent() {
    let runtime = Arc::new(MockRuntime::default());
    {
        let mut state = runtime.state.lock().unwrap();
        state.containers = vec![
            ("old-11111111-proxy".to_string(), false),
            ("live-22222222-proxy".to_string(), true),
            ("live-22222222-app-run-9f1c".to_string(), true),
            ("postgres".to_string(), true),
        ];
        state.networks = vec![
            "old-11111111_airlock".to_string(),
            "old-11111111_bridge".to_string(),
            "live-22222222_airlock".to_string(),
            "unrelated_default".to_string(),
        ];
    }
    let reclaimer = OrphanReclaimer::new(runtime.clone());

    let first = reclaimer.reclaim().await;
    assert_eq!(first.removed_containers, vec!["old-11111111-proxy".to_string()]);
    assert_eq!(
        first.removed_networks,
        vec!["old-11111111_airlock".to_string(), "old-11111111_bridge".to_string()]
    );
    assert!(first.errors.is_empty());

    let second = reclaimer.reclaim().await;
    assert!(!second.removed_anything());

    let state = runtime.state.lock().unwrap();
    assert_eq!(state.containers.len(), 3);
    assert!(state.networks.contains(&"live-22222222_airlock".to_string()));
    assert!(state.networks.contains(&"unrelated_default".to_string()));
}

#[tokio::test]
async fn test_session_reclaims_orphans_first() {
    let fx = fixture(Some(ENFORCE_POLICY));
    let runtime = Arc::new(MockRuntime::default());
    runtime
        .state
        .lock()
        .unwrap()
        .containers
        .push(("stale-deadbeef-proxy".to_string(), false));

    let report = controller(runtime.clone(), &fx.paths)
        .run(demo_session(), SessionRequest::default())
        .await;

    assert_eq!(report.reclamation.removed_containers, vec!["stale-deadbeef-proxy".to_string()]);
    let reclaimed = runtime.position("rm -f stale-deadbeef-proxy").unwrap();
    assert!(reclaimed < runtime.position("compose up proxy").unwrap());
}
