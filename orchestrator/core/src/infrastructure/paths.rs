// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem locations used by a session.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory name of the per-project config root.
pub const LOCAL_DIR_NAME: &str = ".airlock";
pub const TEMPLATE_FILE_NAME: &str = "docker-compose.airlock.yml.template";
const TMP_DIR_NAME: &str = "tmp";
const AGENT_CONFIG_DIR_NAME: &str = "copilot";

#[derive(Debug, Clone)]
pub struct AirlockPaths {
    pub home_dir: PathBuf,
    /// Shared across invocations: template cache, scratch files, agent config.
    pub global_config_dir: PathBuf,
    /// `./.airlock` under the working directory.
    pub local_config_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl AirlockPaths {
    pub fn new(
        home_dir: impl Into<PathBuf>,
        global_config_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let work_dir = work_dir.into();
        Self {
            home_dir: home_dir.into(),
            global_config_dir: global_config_dir.into(),
            local_config_dir: work_dir.join(LOCAL_DIR_NAME),
            work_dir,
        }
    }

    /// Resolve from the process environment: `$AIRLOCK_HOME` or
    /// `~/.config/airlock`, and the current directory.
    pub fn discover() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine the user's home directory")?;
        let global = match std::env::var("AIRLOCK_HOME") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => home.join(".config").join("airlock"),
        };
        let work_dir = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self::new(home, global, work_dir))
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.global_config_dir.join(TMP_DIR_NAME)
    }

    pub fn template_cache_path(&self) -> PathBuf {
        self.global_config_dir.join(TEMPLATE_FILE_NAME)
    }

    pub fn agent_config_dir(&self) -> PathBuf {
        self.global_config_dir.join(AGENT_CONFIG_DIR_NAME)
    }

    /// Last component of the working directory, used in the project name.
    pub fn work_dir_name(&self) -> String {
        dir_name(&self.work_dir)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
