//! Config command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Validate and print the effective configuration, secrets masked.
#[derive(Debug, Args)]
pub struct ConfigCommand {}

#[derive(Debug, Serialize, Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    setting: &'static str,

    #[tabled(rename = "Value")]
    value: String,
}

impl ConfigCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        ctx.config.validate()?;
        let entries = ctx.config.entries();

        match ctx.format {
            OutputFormat::Table => {
                let rows: Vec<SettingRow> = entries
                    .into_iter()
                    .map(|(setting, value)| SettingRow { setting, value })
                    .collect();
                print_output(&rows, ctx.format);
                print_success("Configuration is valid");
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
                    .collect();
                print_single(&map);
            }
        }
        Ok(())
    }
}
