//! REST client for the broker's gear-list endpoint.
//!
//! `GET {api_url}domains/{namespace}/applications/{application}/gears` with
//! HTTP basic authentication and `Accept: application/json`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{debug, error, warn};

use crate::cluster::NodeAddress;
use crate::error::TopologyError;
use crate::gears::{parse_gears, DEFAULT_GEAR_COMPONENT};
use crate::registry::TopologySource;

/// Settings for [`RestTopologyClient`].
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Broker REST base URL, ending with `/`.
    pub api_url: String,
    pub namespace: String,
    pub application: String,
    pub login: String,
    pub passphrase: Option<String>,
    /// Accept any TLS certificate for this client only.
    pub trust_all_ssl: bool,
    /// Gear component whose proxies are the cluster nodes.
    pub component: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestClientConfig {
    pub fn new(
        api_url: impl Into<String>,
        namespace: impl Into<String>,
        application: impl Into<String>,
        login: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            namespace: namespace.into(),
            application: application.into(),
            login: login.into(),
            passphrase: None,
            trust_all_ssl: false,
            component: DEFAULT_GEAR_COMPONENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Reads cluster topology from the broker.
pub struct RestTopologyClient {
    client: reqwest::Client,
    config: RestClientConfig,
}

impl RestTopologyClient {
    /// Build a client with its own TLS policy.
    pub fn new(config: RestClientConfig) -> Result<Self, TopologyError> {
        if config.trust_all_ssl {
            warn!(api_url = %config.api_url, "Accepting any TLS certificate from the broker");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.trust_all_ssl)
            .build()
            .map_err(TopologyError::Client)?;

        Ok(Self { client, config })
    }

    /// Gear-list URL of the configured application.
    pub fn gears_url(&self) -> String {
        format!(
            "{}domains/{}/applications/{}/gears",
            self.config.api_url, self.config.namespace, self.config.application
        )
    }

    /// Fetch and parse the gear list.
    pub async fn read_cluster_topology(&self) -> Result<Vec<NodeAddress>, TopologyError> {
        let url = self.gears_url();
        debug!(url = %url, "Fetching gear list");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .basic_auth(&self.config.login, self.config.passphrase.as_deref())
            .send()
            .await
            .map_err(|source| TopologyError::Fetch {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(url = %url, status = %status, "Failed to fetch gear list");
            return Err(TopologyError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| TopologyError::Fetch {
                url: url.clone(),
                source,
            })?;

        let nodes = parse_gears(&body, &self.config.component)?;
        debug!(url = %url, node_count = nodes.len(), "Parsed gear list");
        Ok(nodes)
    }
}

#[async_trait]
impl TopologySource for RestTopologyClient {
    async fn fetch_nodes(&self) -> Result<Vec<NodeAddress>, TopologyError> {
        self.read_cluster_topology().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gears_url() {
        let config = RestClientConfig::new(
            "https://openshift.redhat.com/broker/rest/",
            "ns",
            "app",
            "user@example.com",
        );
        let client = RestTopologyClient::new(config).unwrap();

        assert_eq!(
            client.gears_url(),
            "https://openshift.redhat.com/broker/rest/domains/ns/applications/app/gears"
        );
    }
}
