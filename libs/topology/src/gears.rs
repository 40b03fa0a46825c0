//! Parsing of the broker's gear-list document.
//!
//! The document looks like:
//!
//! ```json
//! { "data": [ { "components": [
//!     { "name": "jbossas-7", "proxy_host": "node1.example.com", "proxy_port": 35531 }
//! ] } ] }
//! ```

use serde::Deserialize;

use crate::cluster::NodeAddress;
use crate::error::TopologyError;

/// Component name of the application server cartridge.
pub const DEFAULT_GEAR_COMPONENT: &str = "jbossas-7";

#[derive(Debug, Deserialize)]
struct GearList {
    data: Vec<Gear>,
}

#[derive(Debug, Deserialize)]
struct Gear {
    #[serde(default)]
    components: Vec<GearComponent>,
}

#[derive(Debug, Deserialize)]
struct GearComponent {
    name: String,
    #[serde(default)]
    proxy_host: Option<String>,
    #[serde(default)]
    proxy_port: Option<PortValue>,
}

/// Brokers report the port either as a number or as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn to_port(&self) -> Option<u16> {
        match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Extract the proxy address of every `component` entry in a gear list.
///
/// A matching component without a usable host or port fails the whole
/// document, so callers never see a partial topology.
pub fn parse_gears(document: &str, component: &str) -> Result<Vec<NodeAddress>, TopologyError> {
    let gears: GearList = serde_json::from_str(document)?;

    let mut nodes = Vec::new();
    for entry in gears
        .data
        .iter()
        .flat_map(|gear| gear.components.iter())
        .filter(|c| c.name == component)
    {
        let host = entry
            .proxy_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TopologyError::InvalidNode {
                component: entry.name.clone(),
                detail: "missing proxy_host".to_string(),
            })?;

        let port = entry
            .proxy_port
            .as_ref()
            .and_then(PortValue::to_port)
            .ok_or_else(|| TopologyError::InvalidNode {
                component: entry.name.clone(),
                detail: format!("invalid proxy_port for host {host}"),
            })?;

        nodes.push(NodeAddress::new(host, port));
    }

    Ok(nodes)
}
