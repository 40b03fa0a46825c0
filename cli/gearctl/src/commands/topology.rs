//! Topology command.

use anyhow::Result;
use clap::Args;
use gearpush_topology::RestTopologyClient;
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// Read the gear list and show the cluster's nodes.
#[derive(Debug, Args)]
pub struct TopologyCommand {}

#[derive(Debug, Serialize, Tabled)]
struct NodeRow {
    #[tabled(rename = "#")]
    index: usize,

    #[tabled(rename = "Host")]
    host: String,

    #[tabled(rename = "Port")]
    port: u16,

    #[tabled(rename = "URI")]
    uri: String,
}

impl TopologyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        ctx.config.validate()?;

        let client = RestTopologyClient::new(ctx.config.rest_client_config())?;
        let cluster_id = ctx.config.cluster_id();
        ctx.registry.resolve(&cluster_id, &client).await?;

        let rows: Vec<NodeRow> = ctx
            .registry
            .cluster(&cluster_id)
            .await
            .map(|cluster| {
                cluster
                    .nodes()
                    .iter()
                    .enumerate()
                    .map(|(index, node)| NodeRow {
                        index,
                        host: node.host.clone(),
                        port: node.port,
                        uri: node.uri(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        print_output(&rows, ctx.format);
        Ok(())
    }
}
