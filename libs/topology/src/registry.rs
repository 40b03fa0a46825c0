//! Registry of cluster topologies.
//!
//! A registry is created once per process and passed by reference to whatever
//! resolves deployment endpoints. Each cluster is fetched at most once: the
//! first resolution of an id takes a per-id gate, so concurrent callers wait
//! for a single fetch instead of racing. A failed or empty fetch leaves the
//! cluster unresolved and the next resolution retries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cluster::{Cluster, NodeAddress};
use crate::error::TopologyError;

/// Source of the nodes of a cluster.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Fetch every node currently serving the cluster.
    async fn fetch_nodes(&self) -> Result<Vec<NodeAddress>, TopologyError>;
}

/// Registry mapping cluster ids to their nodes.
#[derive(Default)]
pub struct TopologyRegistry {
    clusters: RwLock<HashMap<String, Cluster>>,
    /// Per-id gates guarding the resolve-if-absent path.
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TopologyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node to a cluster, creating the cluster if needed.
    pub async fn add_node(&self, cluster_id: &str, node: NodeAddress) {
        let mut clusters = self.clusters.write().await;
        clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| Cluster::new(cluster_id))
            .add(node);
    }

    /// Append several nodes in one step.
    ///
    /// Readers observe either none or all of `nodes`.
    pub async fn add_nodes(&self, cluster_id: &str, nodes: Vec<NodeAddress>) {
        if nodes.is_empty() {
            return;
        }

        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| Cluster::new(cluster_id));
        for node in nodes {
            cluster.add(node);
        }
    }

    /// True once at least one node has been added for the cluster.
    pub async fn is_resolved(&self, cluster_id: &str) -> bool {
        self.clusters
            .read()
            .await
            .get(cluster_id)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }

    /// Hand out the next node of a cluster for `group`.
    pub async fn pick_node(
        &self,
        cluster_id: &str,
        group: &str,
    ) -> Result<NodeAddress, TopologyError> {
        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .get_mut(cluster_id)
            .ok_or_else(|| TopologyError::UnknownCluster(cluster_id.to_string()))?;

        let node = cluster.pick(group)?;
        debug!(cluster_id = %cluster_id, group = %group, node = %node, "Picked node");
        Ok(node)
    }

    /// Fetch the cluster's nodes from `source` unless already resolved.
    ///
    /// Returns the number of nodes known for the cluster.
    pub async fn resolve<S>(&self, cluster_id: &str, source: &S) -> Result<usize, TopologyError>
    where
        S: TopologySource + ?Sized,
    {
        if let Some(count) = self.node_count(cluster_id).await {
            return Ok(count);
        }

        let gate = self.gate(cluster_id).await;
        let _guard = gate.lock().await;

        // Another caller may have finished the fetch while we waited.
        if let Some(count) = self.node_count(cluster_id).await {
            return Ok(count);
        }

        let nodes = source.fetch_nodes().await?;
        let count = nodes.len();
        if count == 0 {
            warn!(cluster_id = %cluster_id, "Topology source returned no nodes");
            return Ok(0);
        }

        self.add_nodes(cluster_id, nodes).await;
        info!(cluster_id = %cluster_id, node_count = count, "Resolved cluster topology");
        Ok(count)
    }

    /// Resolve the cluster if needed, then hand out the next node for `group`.
    pub async fn resolve_and_pick<S>(
        &self,
        cluster_id: &str,
        group: &str,
        source: &S,
    ) -> Result<NodeAddress, TopologyError>
    where
        S: TopologySource + ?Sized,
    {
        self.resolve(cluster_id, source).await?;
        self.pick_node(cluster_id, group).await
    }

    /// Snapshot of a cluster.
    pub async fn cluster(&self, cluster_id: &str) -> Option<Cluster> {
        self.clusters.read().await.get(cluster_id).cloned()
    }

    /// Ids of every known cluster.
    pub async fn cluster_ids(&self) -> Vec<String> {
        self.clusters.read().await.keys().cloned().collect()
    }

    /// Drop every cluster; the next resolution fetches again.
    ///
    /// Gates are kept so a resolution already in flight still serializes
    /// the ones started after the reset.
    pub async fn reset(&self) {
        self.clusters.write().await.clear();
    }

    async fn node_count(&self, cluster_id: &str) -> Option<usize> {
        self.clusters
            .read()
            .await
            .get(cluster_id)
            .map(Cluster::len)
            .filter(|count| *count > 0)
    }

    async fn gate(&self, cluster_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates
            .entry(cluster_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
