// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology Template Store
//!
//! Ensures the compose topology template exists locally. The first session on a
//! host downloads it once from the configured URL into the global config
//! directory; later sessions use the cached copy.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Download and cache the topology template
//! - **Integration:** Template URL → Global config dir → Topology generator

use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to download topology template from {url}: {message}")]
    Download { url: String, message: String },

    #[error("failed to download topology template: cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct TemplateStore {
    url: String,
    cache_path: PathBuf,
    client: Client,
}

impl TemplateStore {
    pub fn new(url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cache_path: cache_path.into(),
            client: Client::new(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Cached template path, downloading it first when absent.
    pub async fn get_or_fetch(&self) -> Result<PathBuf, TemplateError> {
        if self.cache_path.is_file() {
            debug!("Using cached topology template at {:?}", self.cache_path);
            return Ok(self.cache_path.clone());
        }

        info!("Downloading topology template from {}", self.url);
        let content = self.download().await?;
        self.save(&content)?;
        info!("Cached topology template at {:?}", self.cache_path);

        Ok(self.cache_path.clone())
    }

    async fn download(&self) -> Result<String, TemplateError> {
        let download_error = |message: String| TemplateError::Download {
            url: self.url.clone(),
            message,
        };

        let response = self
            .client
            .get(&self.url)
            .header("User-Agent", concat!("airlock/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }

        response.text().await.map_err(|e| download_error(e.to_string()))
    }

    /// Write to a sibling temp file and rename it into place so concurrent
    /// first-run sessions never read a partial template.
    fn save(&self, content: &str) -> Result<(), TemplateError> {
        let write_error = |source: std::io::Error| TemplateError::Write {
            path: self.cache_path.clone(),
            source,
        };

        let dir = self
            .cache_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir).map_err(write_error)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".template-")
            .tempfile_in(&dir)
            .map_err(write_error)?;
        std::io::Write::write_all(&mut staged, content.as_bytes()).map_err(write_error)?;
        staged
            .persist(&self.cache_path)
            .map_err(|e| write_error(e.error))?;

        Ok(())
    }

    /// Drop the cached copy so the next session downloads a fresh one.
    pub fn clear_cache(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.cache_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
