// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Session Identity
//!
//! Derives the short session token and the project name that roots every
//! resource a session creates (containers, networks, volume, temp files).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Naming convention for session-scoped runtime resources

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Suffix of the proxy container name.
pub const PROXY_SUFFIX: &str = "-proxy";
/// Suffix of the application container name (compose run names extend it).
pub const APP_SUFFIX: &str = "-app";
/// Suffix of the isolated (internal) network.
pub const AIRLOCK_NETWORK_SUFFIX: &str = "_airlock";
/// Suffix of the bridge network the proxy uses for egress.
pub const BRIDGE_NETWORK_SUFFIX: &str = "_bridge";
/// Suffix of the proxy CA scratch volume.
pub const PROXY_CA_VOLUME_SUFFIX: &str = "_proxy-ca";

const FALLBACK_DIR_NAME: &str = "session";

/// Short lowercase hex token identifying one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a token from the current process id and a UTC tick count.
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        // 100ns ticks; nanosecond timestamps overflow past 2262, fall back to micros
        let ticks = now
            .timestamp_nanos_opt()
            .map(|n| n / 100)
            .unwrap_or_else(|| now.timestamp_micros() * 10);
        Self::from_entropy(std::process::id(), ticks)
    }

    /// Deterministic derivation: first 4 bytes of `SHA-256("{pid}-{ticks}")`.
    pub fn from_entropy(pid: u32, ticks: i64) -> Self {
        let digest = Sha256::digest(format!("{}-{}", pid, ticks).as_bytes());
        Self(hex::encode(&digest[..4]))
    }

    /// Wrap an existing token (lowercased).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{sanitized-dir-name}-{sessionId}`, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(dir_name: &str, session_id: &SessionId) -> Self {
        Self(format!("{}-{}", sanitize_dir_name(dir_name), session_id.as_str()).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every resource name derived from this project.
    pub fn resources(&self) -> ResourceNames {
        ResourceNames::for_project(self)
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compose project names only allow `[a-z0-9_-]` and must start with an
/// alphanumeric character.
pub fn sanitize_dir_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = mapped.trim_start_matches(['-', '_']).trim_end_matches('-');
    if trimmed.is_empty() {
        FALLBACK_DIR_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Deterministic names of the runtime resources owned by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub proxy_container: String,
    pub app_container: String,
    pub airlock_network: String,
    pub bridge_network: String,
    pub proxy_ca_volume: String,
}

impl ResourceNames {
    pub fn for_project(project: &ProjectName) -> Self {
        let p = project.as_str();
        Self {
            proxy_container: format!("{}{}", p, PROXY_SUFFIX),
            app_container: format!("{}{}", p, APP_SUFFIX),
            airlock_network: format!("{}{}", p, AIRLOCK_NETWORK_SUFFIX),
            bridge_network: format!("{}{}", p, BRIDGE_NETWORK_SUFFIX),
            proxy_ca_volume: format!("{}{}", p, PROXY_CA_VOLUME_SUFFIX),
        }
    }

    /// Application container prefix paired with a proxy container name, if the
    /// name follows the convention.
    pub fn app_prefix_for_proxy(proxy_container: &str) -> Option<String> {
        proxy_container
            .strip_suffix(PROXY_SUFFIX)
            .filter(|project| !project.is_empty())
            .map(|project| format!("{}{}", project, APP_SUFFIX))
    }

    /// True for network names created by a session.
    pub fn is_session_network(name: &str) -> bool {
        name.ends_with(AIRLOCK_NETWORK_SUFFIX) || name.ends_with(BRIDGE_NETWORK_SUFFIX)
    }
}

/// One invocation's identity plus the images it runs.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub project: ProjectName,
    pub app_image: String,
    pub proxy_image: String,
    pub is_yolo: bool,
}

impl Session {
    pub fn new(
        id: SessionId,
        dir_name: &str,
        app_image: impl Into<String>,
        proxy_image: impl Into<String>,
        is_yolo: bool,
    ) -> Self {
        let project = ProjectName::new(dir_name, &id);
        Self {
            id,
            project,
            app_image: app_image.into(),
            proxy_image: proxy_image.into(),
            is_yolo,
        }
    }

    pub fn resources(&self) -> ResourceNames {
        self.project.resources()
    }
}
