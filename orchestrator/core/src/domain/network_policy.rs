// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Network Policy Model
//!
//! The egress rule file consumed by the proxy container. This subsystem never
//! edits the rules; it only resolves repository placeholders and decides
//! whether audit logging has to be provisioned.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Policy file model, placeholder resolution, active-file lookup

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the rule set in both the local and the global config root.
pub const POLICY_FILE_NAME: &str = "network.json";

pub const OWNER_PLACEHOLDER: &str = "{{GITHUB_OWNER}}";
pub const REPO_PLACEHOLDER: &str = "{{GITHUB_REPO}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    #[default]
    Enforce,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
    pub host: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Network rule set as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRuleSet {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: PolicyMode,

    #[serde(default)]
    pub enable_logging: bool,

    #[serde(default = "default_true")]
    pub inherit_default_rules: bool,

    #[serde(default, alias = "rules")]
    pub allowed_rules: Vec<NetworkRule>,
}

fn default_true() -> bool {
    true
}

impl NetworkRuleSet {
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Logging is needed when explicitly enabled or when the proxy only
    /// observes traffic.
    pub fn requires_audit_logging(&self) -> bool {
        self.enable_logging || self.mode == PolicyMode::Monitor
    }
}

/// Decide from raw file content whether a log directory must be provisioned.
///
/// Structured parsing is preferred; content that does not deserialize (e.g. a
/// hand-edited file with comments) falls back to a marker scan.
pub fn requires_audit_logging(raw: &str) -> bool {
    match NetworkRuleSet::from_json(raw) {
        Ok(rules) => rules.requires_audit_logging(),
        Err(_) => {
            let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            compact.contains("\"enable_logging\":true") || compact.contains("\"mode\":\"monitor\"")
        }
    }
}

/// Replace the repository placeholders. Missing values become empty strings.
pub fn substitute_repo_placeholders(raw: &str, owner: &str, repo: &str) -> String {
    raw.replace(OWNER_PLACEHOLDER, owner)
        .replace(REPO_PLACEHOLDER, repo)
}

/// The local rule file, when present, supersedes the global one entirely.
pub fn active_policy_path(local_root: &Path, global_root: &Path) -> Option<PathBuf> {
    [local_root, global_root]
        .iter()
        .map(|root| root.join(POLICY_FILE_NAME))
        .find(|path| path.is_file())
}
