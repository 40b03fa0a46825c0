//! Session command: deploy, wait for Ctrl+C, undeploy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::output::{print_info, print_success, OutputFormat};

use super::{deploy_all, print_contexts, CommandContext, LocalArchive};

/// Keep archives deployed for the duration of a test run.
#[derive(Debug, Args)]
pub struct SessionCommand {
    /// Archives to deploy.
    #[arg(required = true)]
    archives: Vec<PathBuf>,
}

impl SessionCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let archives = LocalArchive::read_all(&self.archives).await?;
        let names: Vec<String> = archives.iter().map(|a| a.name.clone()).collect();

        let mut deployer = ctx.deployer()?;
        deployer.start().await?;

        let result = async {
            let contexts = deploy_all(&deployer, archives).await?;
            print_contexts(&contexts, ctx.format);
            if ctx.format == OutputFormat::Table {
                print_info("Session running. Press Ctrl+C to undeploy and exit.");
            }

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            info!("Ending session");

            for name in names.iter().rev() {
                deployer.undeploy(name).await?;
            }
            Ok::<_, anyhow::Error>(())
        }
        .await;
        let stopped = deployer.stop().await;

        result?;
        stopped?;

        if ctx.format == OutputFormat::Table {
            print_success("Session ended");
        }
        Ok(())
    }
}
