// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Host mount specifications
//!
//! A mount maps a host path into the application container. When no container
//! path is given it is derived from the host path: paths under the user's home
//! land under the in-container home, everything else under a fixed prefix.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Mount parsing, path derivation and compose volume lines

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Home directory of the unprivileged user inside the application image.
pub const CONTAINER_HOME: &str = "/home/appuser";
/// Prefix for host paths outside the user's home.
pub const NON_HOME_PREFIX: &str = "/host";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("Empty mount specification")]
    Empty,

    #[error("Invalid mount mode '{0}'. Expected 'ro' or 'rw'")]
    InvalidMode(String),

    #[error("Container path must be absolute: {0}")]
    RelativeContainerPath(String),
}

/// Where a mount was configured. Ordered by priority (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountSource {
    Global,
    Local,
    CommandLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: Option<String>,
    pub is_read_write: bool,
    pub source: MountSource,
}

impl MountSpec {
    pub fn read_only(host_path: impl Into<String>, source: MountSource) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: None,
            is_read_write: false,
            source,
        }
    }

    pub fn read_write(host_path: impl Into<String>, source: MountSource) -> Self {
        Self {
            is_read_write: true,
            ..Self::read_only(host_path, source)
        }
    }

    /// Parse `HOST[:CONTAINER][:ro|rw]`. `default_rw` applies when no mode
    /// suffix is present.
    ///
    /// A single-letter first segment followed by `\` or `/` is treated as a
    /// Windows drive (`C:\work`), not as a separator.
    pub fn parse(spec: &str, source: MountSource, default_rw: bool) -> Result<Self, MountError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(MountError::Empty);
        }

        let mut parts = split_mount_spec(spec);
        let mut is_read_write = default_rw;

        if parts.len() > 1 {
            let last = parts[parts.len() - 1].clone();
            match last.as_str() {
                "ro" => {
                    is_read_write = false;
                    parts.pop();
                }
                "rw" => {
                    is_read_write = true;
                    parts.pop();
                }
                _ if parts.len() == 3 => return Err(MountError::InvalidMode(last)),
                _ => {}
            }
        }

        let host_path = parts.remove(0);
        if host_path.is_empty() {
            return Err(MountError::Empty);
        }

        let container_path = match parts.into_iter().next() {
            Some(p) if !p.starts_with('/') => return Err(MountError::RelativeContainerPath(p)),
            other => other,
        };

        Ok(Self {
            host_path,
            container_path,
            is_read_write,
            source,
        })
    }

    /// Absolute host path with `~` expanded and relative paths joined onto `cwd`.
    pub fn resolved_host_path(&self, cwd: &Path, home: &Path) -> PathBuf {
        resolve_host_path(&self.host_path, cwd, home)
    }

    /// Explicit container path, or one derived from the resolved host path.
    pub fn container_path(&self, cwd: &Path, home: &Path) -> String {
        match &self.container_path {
            Some(p) => p.clone(),
            None => container_path_for(&self.resolved_host_path(cwd, home), home),
        }
    }

    pub fn mode(&self) -> &'static str {
        if self.is_read_write {
            "rw"
        } else {
            "ro"
        }
    }

    /// `- {host}:{container}:{ro|rw}` compose volume entry (without indentation).
    pub fn to_volume_entry(&self, cwd: &Path, home: &Path) -> String {
        format!(
            "- {}:{}:{}",
            compose_path(&self.resolved_host_path(cwd, home)),
            self.container_path(cwd, home),
            self.mode()
        )
    }
}

fn split_mount_spec(spec: &str) -> Vec<String> {
    let bytes = spec.as_bytes();
    let drive_prefix = bytes.len() > 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');

    let (head, rest) = if drive_prefix {
        spec.split_at(2)
    } else {
        ("", spec)
    };

    let mut parts: Vec<String> = rest.split(':').map(str::to_string).collect();
    if let Some(first) = parts.first_mut() {
        first.insert_str(0, head);
    }
    parts
}

/// Expand `~`, absolutise against `cwd` and drop `.`/`..` components lexically.
pub fn resolve_host_path(raw: &str, cwd: &Path, home: &Path) -> PathBuf {
    let expanded = if raw == "~" {
        home.to_path_buf()
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        home.join(rest)
    } else {
        PathBuf::from(raw)
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    normalize(&absolute)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Deterministic in-container location for a resolved host path.
pub fn container_path_for(host_path: &Path, home: &Path) -> String {
    if let Ok(rel) = host_path.strip_prefix(home) {
        let rel = forward_slashes(rel);
        if rel.is_empty() {
            CONTAINER_HOME.to_string()
        } else {
            format!("{}/{}", CONTAINER_HOME, rel)
        }
    } else {
        let mut rel = PathBuf::new();
        for component in host_path.components() {
            match component {
                Component::Prefix(prefix) => {
                    // C: -> c
                    let drive = prefix
                        .as_os_str()
                        .to_string_lossy()
                        .trim_end_matches(':')
                        .to_lowercase();
                    rel.push(drive);
                }
                Component::RootDir => {}
                other => rel.push(other),
            }
        }
        let rel = forward_slashes(&rel);
        if rel.is_empty() {
            NON_HOME_PREFIX.to_string()
        } else {
            format!("{}/{}", NON_HOME_PREFIX, rel)
        }
    }
}

/// Host path as written into the topology document.
pub fn compose_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Collapse mounts sharing a resolved host path, keeping the highest-priority
/// source, and drop mounts of the working directory itself. Input order is
/// preserved for the survivors.
pub fn dedupe_mounts(mounts: Vec<MountSpec>, cwd: &Path, home: &Path) -> Vec<MountSpec> {
    let work_dir = normalize(cwd);
    let mut kept: Vec<(PathBuf, MountSpec)> = Vec::new();

    for mount in mounts {
        let resolved = mount.resolved_host_path(cwd, home);
        if resolved == work_dir {
            tracing::debug!(path = %resolved.display(), "Skipping mount of working directory");
            continue;
        }
        match kept.iter_mut().find(|(path, _)| *path == resolved) {
            Some((_, existing)) if mount.source >= existing.source => *existing = mount,
            Some(_) => {}
            None => kept.push((resolved, mount)),
        }
    }

    kept.into_iter().map(|(_, m)| m).collect()
}
