// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Airlock configuration
//
// Defines the user-editable settings of a session:
// - Container runtime selection
// - Application and proxy image references
// - Topology template source
// - Extra host mounts (read-only and read-write)
//
// Files are layered: the global file under the config home, then the local
// file under ./.airlock. Local scalars override global ones; local mounts are
// appended. Environment overrides are applied last.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::mount::{MountSource, MountSpec};
use crate::domain::runtime::RuntimeKind;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

pub const DEFAULT_APP_IMAGE: &str = "ghcr.io/airlock-run/airlock-app";
pub const DEFAULT_PROXY_IMAGE: &str = "ghcr.io/airlock-run/airlock-proxy";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
pub const DEFAULT_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/airlock-run/airlock/main/templates/docker-compose.airlock.yml.template";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSelection {
    /// docker if on PATH, else podman
    #[default]
    Auto,
    Docker,
    Podman,
}

impl RuntimeSelection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "docker" => Some(Self::Docker),
            "podman" => Some(Self::Podman),
            _ => None,
        }
    }

    /// Fixed engine, if one was chosen explicitly.
    pub fn fixed(&self) -> Option<RuntimeKind> {
        match self {
            Self::Auto => None,
            Self::Docker => Some(RuntimeKind::Docker),
            Self::Podman => Some(RuntimeKind::Podman),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlockConfig {
    #[serde(default)]
    pub runtime: RuntimeSelection,

    /// Image tag applied to both images
    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Application image repository (without tag)
    #[serde(default = "default_app_image")]
    pub app_image: String,

    /// Proxy image repository (without tag)
    #[serde(default = "default_proxy_image")]
    pub proxy_image: String,

    #[serde(default = "default_template_url")]
    pub template_url: String,

    /// Read-only host mounts
    #[serde(default)]
    pub mounts: Vec<String>,

    /// Read-write host mounts
    #[serde(default)]
    pub mounts_rw: Vec<String>,

    /// Source of `mounts`/`mounts_rw` entries; set while layering, not serialized.
    #[serde(skip)]
    mount_sources: Vec<(MountSource, String, bool)>,
}

/// Partial file contents; absent keys leave the lower layer untouched.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    runtime: Option<RuntimeSelection>,
    image_tag: Option<String>,
    app_image: Option<String>,
    proxy_image: Option<String>,
    template_url: Option<String>,
    #[serde(default)]
    mounts: Vec<String>,
    #[serde(default)]
    mounts_rw: Vec<String>,
}

fn default_image_tag() -> String {
    DEFAULT_IMAGE_TAG.to_string()
}

fn default_app_image() -> String {
    DEFAULT_APP_IMAGE.to_string()
}

fn default_proxy_image() -> String {
    DEFAULT_PROXY_IMAGE.to_string()
}

fn default_template_url() -> String {
    DEFAULT_TEMPLATE_URL.to_string()
}

impl Default for AirlockConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeSelection::default(),
            image_tag: default_image_tag(),
            app_image: default_app_image(),
            proxy_image: default_proxy_image(),
            template_url: default_template_url(),
            mounts: Vec::new(),
            mounts_rw: Vec::new(),
            mount_sources: Vec::new(),
        }
    }
}

impl AirlockConfig {
    /// Parse a single configuration document (treated as the global layer).
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.merge_layer(serde_yaml::from_str(yaml)?, MountSource::Global);
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load the global and local files (each optional), then apply environment
    /// overrides.
    pub fn load_layered(global_dir: &Path, local_dir: &Path) -> anyhow::Result<Self> {
        let mut config = Self::default();

        for (dir, source) in [(global_dir, MountSource::Global), (local_dir, MountSource::Local)] {
            let path = dir.join(CONFIG_FILE_NAME);
            if !path.is_file() {
                continue;
            }
            tracing::debug!("Loading configuration layer from {:?}", path);
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read config at {:?}: {}", path, e))?;
            let layer: ConfigLayer = serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config at {:?}: {}", path, e))?;
            config.merge_layer(layer, source);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn merge_layer(&mut self, layer: ConfigLayer, source: MountSource) {
        if let Some(runtime) = layer.runtime {
            self.runtime = runtime;
        }
        if let Some(tag) = layer.image_tag {
            self.image_tag = tag;
        }
        if let Some(image) = layer.app_image {
            self.app_image = image;
        }
        if let Some(image) = layer.proxy_image {
            self.proxy_image = image;
        }
        if let Some(url) = layer.template_url {
            self.template_url = url;
        }
        for mount in layer.mounts {
            self.mount_sources.push((source, mount.clone(), false));
            self.mounts.push(mount);
        }
        for mount in layer.mounts_rw {
            self.mount_sources.push((source, mount.clone(), true));
            self.mounts_rw.push(mount);
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AIRLOCK_RUNTIME") {
            match RuntimeSelection::parse(&val) {
                Some(selection) => {
                    tracing::info!("Environment override: AIRLOCK_RUNTIME={}", val);
                    self.runtime = selection;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for AIRLOCK_RUNTIME: '{}'. Expected auto/docker/podman. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("AIRLOCK_IMAGE_TAG") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: AIRLOCK_IMAGE_TAG={}", val);
                self.image_tag = val.trim().to_string();
            }
        }

        if let Ok(val) = std::env::var("AIRLOCK_TEMPLATE_URL") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: AIRLOCK_TEMPLATE_URL={}", val);
                self.template_url = val.trim().to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app_image.trim().is_empty() {
            anyhow::bail!("app_image must not be empty");
        }
        if self.proxy_image.trim().is_empty() {
            anyhow::bail!("proxy_image must not be empty");
        }
        if self.image_tag.trim().is_empty() || self.image_tag.contains(':') {
            anyhow::bail!("Invalid image_tag: '{}'", self.image_tag);
        }
        let url = &self.template_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            anyhow::bail!(
                "Invalid template_url: '{}'. Must be an http(s) URL",
                self.template_url
            );
        }
        for (source, spec, rw) in &self.mount_sources {
            MountSpec::parse(spec, *source, *rw)
                .map_err(|e| anyhow::anyhow!("Invalid mount '{}' ({:?}): {}", spec, source, e))?;
        }
        Ok(())
    }

    pub fn app_image_ref(&self) -> String {
        format!("{}:{}", self.app_image, self.image_tag)
    }

    pub fn proxy_image_ref(&self) -> String {
        format!("{}:{}", self.proxy_image, self.image_tag)
    }

    /// Configured mounts in layer order. Entries that fail to parse are
    /// skipped with a warning; `validate` reports them as errors.
    pub fn mount_specs(&self) -> Vec<MountSpec> {
        self.mount_sources
            .iter()
            .filter_map(|(source, spec, rw)| match MountSpec::parse(spec, *source, *rw) {
                Ok(mount) => Some(mount),
                Err(e) => {
                    tracing::warn!("Ignoring invalid mount '{}': {}", spec, e);
                    None
                }
            })
            .collect()
    }
}
