// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Network Policy Processor
//!
//! Materializes the active network rule file for the proxy container:
//! repository placeholders are resolved from the working directory's git
//! remote and the result is written to a scratch file under the global config
//! directory, which (unlike some host temp directories) the container runtime
//! can always bind-mount.
//!
//! When the rules ask for audit logging (or monitor mode), a `logs/`
//! directory is provisioned next to the policy file and seeded with a
//! `.gitignore` so captured traffic never ends up in version control.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::network_policy::{requires_audit_logging, substitute_repo_placeholders};
use crate::domain::session::SessionId;
use crate::infrastructure::git_remote::{resolve_github_repo, GitHubRepo};

pub const LOGS_DIR_NAME: &str = "logs";
const LOGS_GITIGNORE: &str = "# Captured proxy logs; never commit\n*\n";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read network policy {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write processed network policy under {dir:?}: {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Placeholder-resolved copy of the rule file, owned by the session.
#[derive(Debug, Clone)]
pub struct ProcessedPolicy {
    pub path: PathBuf,
    /// Logging or monitor mode was requested by the raw rules.
    pub audit_logging: bool,
    /// Host directory the proxy writes logs to when `audit_logging` is set.
    pub logs_dir: PathBuf,
}

impl ProcessedPolicy {
    pub fn logs_mount_source(&self) -> Option<&Path> {
        self.audit_logging.then_some(self.logs_dir.as_path())
    }
}

pub struct PolicyProcessor {
    scratch_dir: PathBuf,
}

impl PolicyProcessor {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Resolve placeholders in `rules_path` using the git remote of `repo_dir`
    /// and write the result to a fresh scratch file.
    pub fn process(
        &self,
        rules_path: &Path,
        repo_dir: &Path,
        session: &SessionId,
    ) -> Result<ProcessedPolicy, PolicyError> {
        let raw = std::fs::read_to_string(rules_path).map_err(|source| PolicyError::Read {
            path: rules_path.to_path_buf(),
            source,
        })?;

        let repo = resolve_github_repo(repo_dir).unwrap_or_else(|| {
            debug!("Repository placeholders resolve to empty values");
            GitHubRepo::default()
        });
        let processed = substitute_repo_placeholders(&raw, &repo.owner, &repo.name);

        let path = self.write_scratch(&processed, session)?;
        info!("Processed network policy written to {:?}", path);

        let policy_dir = rules_path.parent().unwrap_or_else(|| Path::new("."));
        let logs_dir = policy_dir.join(LOGS_DIR_NAME);
        let audit_logging = requires_audit_logging(&raw);
        if audit_logging {
            if let Err(e) = ensure_logs_dir(&logs_dir) {
                warn!("Could not prepare log directory {:?}: {}", logs_dir, e);
            }
        }

        Ok(ProcessedPolicy {
            path,
            audit_logging,
            logs_dir,
        })
    }

    fn write_scratch(&self, content: &str, session: &SessionId) -> Result<PathBuf, PolicyError> {
        let write_error = |source: std::io::Error| PolicyError::Write {
            dir: self.scratch_dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.scratch_dir).map_err(write_error)?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("network-{}-", session))
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)
            .map_err(write_error)?;
        file.write_all(content.as_bytes()).map_err(write_error)?;

        let (_, path) = file.keep().map_err(|e| write_error(e.error))?;
        Ok(path)
    }
}

/// Create the log directory and its `.gitignore` if missing.
pub fn ensure_logs_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let ignore = dir.join(".gitignore");
    if !ignore.exists() {
        std::fs::write(&ignore, LOGS_GITIGNORE)?;
        debug!("Seeded {:?}", ignore);
    }
    Ok(())
}
