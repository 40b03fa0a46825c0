//! # gearpush-topology
//!
//! Cluster topology for applications spread across several gears.
//!
//! A cluster is identified by `{domain}:{namespace}:{application}` and holds the
//! proxy addresses of every gear running the application cartridge. Nodes are
//! handed out per group (usually a deployment name) in discovery order, so that
//! several deployments sharing one cluster can each claim a different node.
//!
//! ## Modules
//!
//! - `cluster`: node list and per-group cursors for one cluster
//! - `registry`: registry of clusters, resolved lazily from a [`TopologySource`]
//! - `gears`: parsing of the broker's gear-list document
//! - `client`: REST client for the broker's gear-list endpoint

mod client;
mod cluster;
mod error;
mod gears;
mod registry;

pub use client::{RestClientConfig, RestTopologyClient};
pub use cluster::{Cluster, NodeAddress};
pub use error::TopologyError;
pub use gears::{parse_gears, DEFAULT_GEAR_COMPONENT};
pub use registry::{TopologyRegistry, TopologySource};
