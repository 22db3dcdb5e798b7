// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orphan reclamation
//!
//! Sessions killed before teardown leave their proxy container and networks
//! behind. Before each new session the sweep removes:
//!
//! - proxy containers whose paired application container is not running
//! - session networks with no attached containers
//!
//! Every query and removal is independent; one failure never aborts the scan.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::runtime::ContainerRuntime;
use crate::domain::session::{ResourceNames, PROXY_SUFFIX};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclamationReport {
    pub removed_containers: Vec<String>,
    pub removed_networks: Vec<String>,
    pub errors: Vec<String>,
}

impl ReclamationReport {
    pub fn removed_anything(&self) -> bool {
        !self.removed_containers.is_empty() || !self.removed_networks.is_empty()
    }
}

pub struct OrphanReclaimer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl OrphanReclaimer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn reclaim(&self) -> ReclamationReport {
        let mut report = ReclamationReport::default();
        self.reclaim_containers(&mut report).await;
        self.reclaim_networks(&mut report).await;

        if report.removed_anything() {
            info!(
                containers = report.removed_containers.len(),
                networks = report.removed_networks.len(),
                "Reclaimed orphaned session resources"
            );
        }
        report
    }

    async fn reclaim_containers(&self, report: &mut ReclamationReport) {
        let proxies: Vec<String> = match self.runtime.list_containers(true).await {
            Ok(names) => names.into_iter().filter(|n| n.ends_with(PROXY_SUFFIX)).collect(),
            Err(e) => {
                report.errors.push(format!("list containers: {}", e));
                return;
            }
        };
        if proxies.is_empty() {
            return;
        }

        // Without the running set an in-use proxy cannot be told apart from an orphan.
        let running = match self.runtime.list_containers(false).await {
            Ok(names) => names,
            Err(e) => {
                report.errors.push(format!("list running containers: {}", e));
                return;
            }
        };

        for proxy in proxies {
            let Some(app_prefix) = ResourceNames::app_prefix_for_proxy(&proxy) else {
                continue;
            };
            if running.iter().any(|name| name.starts_with(&app_prefix)) {
                debug!(container = %proxy, "Proxy still paired with a running app container");
                continue;
            }

            match self.runtime.remove_container(&proxy, true).await {
                Ok(()) => {
                    debug!(container = %proxy, "Removed orphaned proxy container");
                    report.removed_containers.push(proxy);
                }
                Err(e) => report.errors.push(format!("remove container {}: {}", proxy, e)),
            }
        }
    }

    async fn reclaim_networks(&self, report: &mut ReclamationReport) {
        let networks = match self.runtime.list_networks().await {
            Ok(names) => names,
            Err(e) => {
                report.errors.push(format!("list networks: {}", e));
                return;
            }
        };

        for network in networks.into_iter().filter(|n| ResourceNames::is_session_network(n)) {
            match self.runtime.network_container_count(&network).await {
                Ok(0) => {}
                Ok(count) => {
                    debug!(network = %network, attached = count, "Network still in use");
                    continue;
                }
                Err(e) => {
                    report.errors.push(format!("inspect network {}: {}", network, e));
                    continue;
                }
            }

            match self.runtime.remove_network(&network).await {
                Ok(()) => {
                    debug!(network = %network, "Removed orphaned network");
                    report.removed_networks.push(network);
                }
                Err(e) => report.errors.push(format!("remove network {}: {}", network, e)),
            }
        }
    }
}
