//! Node list and per-group assignment for a single cluster.
//!
//! Assignment is round-robin by group without wraparound: the i-th pick for a
//! group returns the i-th node in discovery order, and a pick past the last
//! node fails with [`TopologyError::NodesExhausted`].

use std::collections::HashMap;
use std::fmt;

use crate::error::TopologyError;

/// Address of a gear's proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Proxy host as reported by the broker.
    pub host: String,
    /// Proxy port as reported by the broker.
    pub port: u16,
}

impl NodeAddress {
    /// Create a new node address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// HTTP URI of the node, `http://{host}:{port}`.
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}", self.host, self.port)
    }
}

/// Nodes of one logical cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    id: String,
    nodes: Vec<NodeAddress>,
    /// Next index to hand out, keyed by group.
    cursors: HashMap<String, usize>,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            cursors: HashMap::new(),
        }
    }

    /// Cluster identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> &[NodeAddress] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node. Duplicates are kept.
    pub fn add(&mut self, node: NodeAddress) {
        self.nodes.push(node);
    }

    /// Hand out the next node for `group`.
    ///
    /// The cursor only advances when a node is returned, so once a group is
    /// exhausted every further pick fails the same way.
    pub fn pick(&mut self, group: &str) -> Result<NodeAddress, TopologyError> {
        let cursor = self.cursors.entry(group.to_string()).or_insert(0);

        match self.nodes.get(*cursor) {
            Some(node) => {
                *cursor += 1;
                Ok(node.clone())
            }
            None => Err(TopologyError::NodesExhausted {
                cluster_id: self.id.clone(),
                group: group.to_string(),
                available: self.nodes.len(),
            }),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.id)?;
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}")?;
        }
        write!(f, "]")
    }
}
