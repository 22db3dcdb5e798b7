// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Topology Template Engine
//!
//! Renders the cached compose template into the concrete two-container
//! topology of one session.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Substitute session values into the topology template
//! - **Integration:** Template store + policy processor → compose file → runtime
//!
//! # Placeholders
//!
//! Inline tokens are replaced in place:
//!
//! - `{{PROJECT_NAME}}`, `{{APP_IMAGE}}`, `{{PROXY_IMAGE}}`
//! - `{{WORK_DIR}}`, `{{CONTAINER_WORK_DIR}}`, `{{COPILOT_CONFIG}}`
//! - `{{NETWORK_CONFIG}}`, `{{PUID}}`, `{{PGID}}`, `{{COPILOT_ARGS}}`
//!
//! Block tokens must sit alone on their line and expand to zero or more whole
//! lines that reuse the placeholder's indentation. Zero lines removes the
//! placeholder line entirely:
//!
//! - `{{EXTRA_MOUNTS}}` - one volume entry per configured mount
//! - `{{LOGS_MOUNT}}` - the proxy log bind mount when audit logging is on
//!
//! No placeholder may appear on a comment line.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::agent_command::{build_agent_command, encode_command};
use crate::domain::mount::{compose_path, container_path_for, MountSpec};
use crate::domain::session::Session;
use crate::infrastructure::paths::AirlockPaths;
use crate::infrastructure::policy_processor::ProcessedPolicy;

pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const APP_IMAGE: &str = "APP_IMAGE";
pub const PROXY_IMAGE: &str = "PROXY_IMAGE";
pub const WORK_DIR: &str = "WORK_DIR";
pub const CONTAINER_WORK_DIR: &str = "CONTAINER_WORK_DIR";
pub const COPILOT_CONFIG: &str = "COPILOT_CONFIG";
pub const NETWORK_CONFIG: &str = "NETWORK_CONFIG";
pub const PUID: &str = "PUID";
pub const PGID: &str = "PGID";
pub const COPILOT_ARGS: &str = "COPILOT_ARGS";
pub const EXTRA_MOUNTS: &str = "EXTRA_MOUNTS";
pub const LOGS_MOUNT: &str = "LOGS_MOUNT";

const INLINE_TOKENS: [&str; 10] = [
    PROJECT_NAME,
    APP_IMAGE,
    PROXY_IMAGE,
    WORK_DIR,
    CONTAINER_WORK_DIR,
    COPILOT_CONFIG,
    NETWORK_CONFIG,
    PUID,
    PGID,
    COPILOT_ARGS,
];
const BLOCK_TOKENS: [&str; 2] = [EXTRA_MOUNTS, LOGS_MOUNT];

/// Where the proxy writes its audit logs inside its container.
pub const LOGS_CONTAINER_PATH: &str = "/var/log/airlock";

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Failed to read topology template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write topology file under {dir:?}: {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: block placeholder {{{{{token}}}}} must be alone on its line")]
    BlockNotAlone { token: String, line: usize },

    #[error("Line {line}: placeholder {{{{{token}}}}} inside a comment")]
    PlaceholderInComment { token: String, line: usize },

    #[error("Line {line}: no value for placeholder {{{{{token}}}}}")]
    Unresolved { token: String, line: usize },
}

/// Values for every placeholder of the template.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    inline: Vec<(String, String)>,
    blocks: Vec<(String, Vec<String>)>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inline(mut self, token: &str, value: impl Into<String>) -> Self {
        self.inline.push((token.to_string(), value.into()));
        self
    }

    /// Lines replacing a block placeholder (without indentation).
    pub fn block(mut self, token: &str, lines: Vec<String>) -> Self {
        self.blocks.push((token.to_string(), lines));
        self
    }

    fn inline_value(&self, token: &str) -> Option<&str> {
        self.inline
            .iter()
            .find(|(name, _)| name == token)
            .map(|(_, value)| value.as_str())
    }

    fn block_lines(&self, token: &str) -> Option<&[String]> {
        self.blocks
            .iter()
            .find(|(name, _)| name == token)
            .map(|(_, lines)| lines.as_slice())
    }
}

fn is_known(token: &str) -> bool {
    INLINE_TOKENS.contains(&token) || BLOCK_TOKENS.contains(&token)
}

/// `{{NAME}}` tokens on a line as (byte start, byte end, name).
fn find_tokens(line: &str) -> Vec<(usize, usize, &str)> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    while let Some(open) = line[offset..].find("{{") {
        let start = offset + open;
        match line[start + 2..].find("}}") {
            Some(close) => {
                let end = start + 2 + close + 2;
                tokens.push((start, end, &line[start + 2..end - 2]));
                offset = end;
            }
            None => break,
        }
    }
    tokens
}

/// Render `template` with `table`. Pure; no filesystem access.
///
/// Unknown `{{...}}` sequences are left untouched. Substituted values are
/// never rescanned.
pub fn render(template: &str, table: &TokenTable) -> Result<String, TopologyError> {
    let mut out: Vec<String> = Vec::new();

    for (index, line) in template.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        let tokens: Vec<_> = find_tokens(line)
            .into_iter()
            .filter(|(_, _, name)| is_known(name))
            .collect();

        if tokens.is_empty() {
            out.push(line.to_string());
            continue;
        }

        if trimmed.starts_with('#') {
            return Err(TopologyError::PlaceholderInComment {
                token: tokens[0].2.to_string(),
                line: line_no,
            });
        }

        let block_token = tokens
            .iter()
            .find(|(_, _, name)| BLOCK_TOKENS.contains(name));
        if let Some(&(_, _, block)) = block_token {
            if trimmed != format!("{{{{{}}}}}", block) {
                return Err(TopologyError::BlockNotAlone {
                    token: block.to_string(),
                    line: line_no,
                });
            }
            let lines = table.block_lines(block).ok_or_else(|| TopologyError::Unresolved {
                token: block.to_string(),
                line: line_no,
            })?;
            let indent = &line[..line.len() - line.trim_start().len()];
            out.extend(lines.iter().map(|l| format!("{}{}", indent, l)));
            continue;
        }

        let mut rendered = String::with_capacity(line.len());
        let mut cursor = 0;
        for (start, end, name) in tokens {
            let value = table.inline_value(name).ok_or_else(|| TopologyError::Unresolved {
                token: name.to_string(),
                line: line_no,
            })?;
            rendered.push_str(&line[cursor..start]);
            rendered.push_str(value);
            cursor = end;
        }
        rendered.push_str(&line[cursor..]);
        out.push(rendered);
    }

    let mut document = out.join("\n");
    if template.ends_with('\n') {
        document.push('\n');
    }
    Ok(document)
}

/// Concrete values of one session's topology.
#[derive(Debug, Clone)]
pub struct TopologyValues {
    pub project_name: String,
    pub app_image: String,
    pub proxy_image: String,
    pub work_dir: String,
    pub container_work_dir: String,
    pub copilot_config: String,
    pub network_config: String,
    pub puid: u32,
    pub pgid: u32,
    pub agent_command: Vec<String>,
    pub extra_mounts: Vec<String>,
    pub logs_mount: Option<String>,
}

impl TopologyValues {
    pub fn for_session(
        session: &Session,
        paths: &AirlockPaths,
        policy: &ProcessedPolicy,
        mounts: &[MountSpec],
        agent_args: &[String],
    ) -> Self {
        let container_work_dir = container_path_for(&paths.work_dir, &paths.home_dir);
        let (puid, pgid) = host_user_ids();

        Self {
            project_name: session.project.to_string(),
            app_image: session.app_image.clone(),
            proxy_image: session.proxy_image.clone(),
            work_dir: compose_path(&paths.work_dir),
            agent_command: build_agent_command(agent_args, session.is_yolo, &container_work_dir),
            container_work_dir,
            copilot_config: compose_path(&paths.agent_config_dir()),
            network_config: compose_path(&policy.path),
            puid,
            pgid,
            extra_mounts: mounts
                .iter()
                .map(|m| m.to_volume_entry(&paths.work_dir, &paths.home_dir))
                .collect(),
            logs_mount: policy
                .logs_mount_source()
                .map(|dir| format!("- {}:{}:rw", compose_path(dir), LOGS_CONTAINER_PATH)),
        }
    }

    pub fn token_table(&self) -> TokenTable {
        TokenTable::new()
            .inline(PROJECT_NAME, &self.project_name)
            .inline(APP_IMAGE, &self.app_image)
            .inline(PROXY_IMAGE, &self.proxy_image)
            .inline(WORK_DIR, &self.work_dir)
            .inline(CONTAINER_WORK_DIR, &self.container_work_dir)
            .inline(COPILOT_CONFIG, &self.copilot_config)
            .inline(NETWORK_CONFIG, &self.network_config)
            .inline(PUID, self.puid.to_string())
            .inline(PGID, self.pgid.to_string())
            .inline(COPILOT_ARGS, encode_command(&self.agent_command))
            .block(EXTRA_MOUNTS, self.extra_mounts.clone())
            .block(LOGS_MOUNT, self.logs_mount.iter().cloned().collect())
    }
}

/// Numeric uid/gid the application container should run file operations as.
pub fn host_user_ids() -> (u32, u32) {
    #[cfg(unix)]
    {
        // SAFETY: getuid/getgid cannot fail and touch no memory
        unsafe { (libc::getuid(), libc::getgid()) }
    }

    #[cfg(not(unix))]
    {
        (1000, 1000)
    }
}

/// Writes rendered topologies into the scratch directory.
pub struct TopologyGenerator {
    scratch_dir: PathBuf,
}

impl TopologyGenerator {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Render the template file and write the result to a fresh scratch file.
    pub fn generate(
        &self,
        template_path: &Path,
        values: &TopologyValues,
        session_tag: &str,
    ) -> Result<PathBuf, TopologyError> {
        let template = std::fs::read_to_string(template_path).map_err(|source| TopologyError::Read {
            path: template_path.to_path_buf(),
            source,
        })?;

        let document = render(&template, &values.token_table())?;
        debug!(
            mounts = values.extra_mounts.len(),
            logs = values.logs_mount.is_some(),
            "Rendered topology"
        );

        let write_error = |source: std::io::Error| TopologyError::Write {
            dir: self.scratch_dir.clone(),
            source,
        };
        std::fs::create_dir_all(&self.scratch_dir).map_err(write_error)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("compose-{}-", session_tag))
            .suffix(".yml")
            .tempfile_in(&self.scratch_dir)
            .map_err(write_error)?;
        file.write_all(document.as_bytes()).map_err(write_error)?;
        let (_, path) = file.keep().map_err(|e| write_error(e.error))?;

        info!("Topology written to {:?}", path);
        Ok(path)
    }
}
