//! Error types for topology resolution.

use thiserror::Error;

/// Errors raised while resolving or using a cluster topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The HTTP client could not be built.
    #[error("unable to build topology HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The gear list could not be fetched.
    #[error("unable to read cluster topology from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The broker answered with a non-success status.
    #[error("topology endpoint {url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// The gear list is not a valid document.
    #[error("invalid gear list document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A gear component carries an unusable proxy address.
    #[error("invalid node address in component {component}: {detail}")]
    InvalidNode { component: String, detail: String },

    /// No node has been registered for the cluster.
    #[error("cluster {0} has no resolved nodes")]
    UnknownCluster(String),

    /// Every node of the cluster has already been handed out to the group.
    #[error("no remaining nodes for group {group} in cluster {cluster_id} ({available} available)")]
    NodesExhausted {
        cluster_id: String,
        group: String,
        available: usize,
    },
}
