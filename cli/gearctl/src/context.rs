//! Where deployed archives can be reached.

use std::sync::Arc;

use gearpush_topology::{TopologyRegistry, TopologySource};
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info};

use crate::archive::{ScanOutcome, WebModule};
use crate::config::ConfigError;
use crate::error::DeployError;

/// Port of the application's public front end.
pub const FRONT_END_PORT: u16 = 80;

/// Context root of a deployment.
///
/// A root declared by the archive wins. `root.war` is served at the root
/// context; any other name maps to itself without its last extension.
pub fn context_root(deployment_name: &str, explicit: Option<&str>) -> String {
    if let Some(root) = explicit {
        return root.trim().trim_start_matches('/').to_string();
    }
    if deployment_name.eq_ignore_ascii_case("root.war") {
        return String::new();
    }
    deployment_stem(deployment_name)
}

/// Name without leading slash and without its last extension.
pub fn deployment_stem(name: &str) -> String {
    let name = name.strip_prefix('/').unwrap_or(name);
    match name.rfind('.') {
        Some(dot) => name[..dot].to_string(),
        None => name.to_string(),
    }
}

/// URL answering `200 OK` once `deployment_name` is deployed.
pub fn readiness_url(
    host_name: &str,
    ping_archive: &str,
    deployment_name: &str,
) -> Result<String, ConfigError> {
    let base = format!(
        "http://{host_name}:{FRONT_END_PORT}/{}/deploy",
        deployment_stem(ping_archive)
    );
    let mut url = Url::parse(&base).map_err(|e| ConfigError::InvalidUrl {
        url: base.clone(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("name", deployment_name);
    Ok(url.into())
}

/// An HTTP endpoint serving a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpContext {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Front end that forwards test requests.
    pub proxy_host: String,
    pub proxy_port: u16,
    pub modules: Vec<WebModule>,
}

impl HttpContext {
    fn front_end(host_name: &str) -> Self {
        Self {
            name: format!("{host_name}:{FRONT_END_PORT}"),
            host: host_name.to_string(),
            port: FRONT_END_PORT,
            proxy_host: host_name.to_string(),
            proxy_port: FRONT_END_PORT,
            modules: Vec::new(),
        }
    }

    /// Base URL of the context.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Resolves HTTP contexts for deployed archives.
///
/// With proxying on, every archive claims its own node of the application's
/// cluster; the cluster is read from the topology source on first use.
pub struct ContextResolver {
    host_name: String,
    cluster_id: String,
    proxy_requests: bool,
    registry: Arc<TopologyRegistry>,
    source: Arc<dyn TopologySource>,
}

impl ContextResolver {
    pub fn new(
        host_name: impl Into<String>,
        cluster_id: impl Into<String>,
        proxy_requests: bool,
        registry: Arc<TopologyRegistry>,
        source: Arc<dyn TopologySource>,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            cluster_id: cluster_id.into(),
            proxy_requests,
            registry,
            source,
        }
    }

    /// Context serving the archive `name`, enriched with the modules found by
    /// scanning it.
    pub async fn resolve(
        &self,
        name: &str,
        outcome: ScanOutcome,
    ) -> Result<HttpContext, DeployError> {
        let mut context = if self.proxy_requests {
            let node = self
                .registry
                .resolve_and_pick(&self.cluster_id, name, self.source.as_ref())
                .await?;
            info!(archive = %name, node = %node, "Assigned cluster node");

            HttpContext {
                name: format!("{}:{}:{}", node.host, node.port, self.host_name),
                host: node.host,
                port: node.port,
                ..HttpContext::front_end(&self.host_name)
            }
        } else {
            HttpContext::front_end(&self.host_name)
        };

        match outcome {
            ScanOutcome::Modules(modules) => {
                for module in &modules {
                    debug!(context = %context.name, archive = %module.archive, path = %module.path(), "Enriched context");
                }
                context.modules = modules;
            }
            ScanOutcome::Skipped { reason } => {
                debug!(archive = %name, reason = %reason, "No web modules");
            }
        }

        Ok(context)
    }
}
