//! Deploy command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::output::print_success;

use super::{deploy_all, print_contexts, CommandContext, LocalArchive};

/// Deploy archives and end the session.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Archives to deploy (war, ear, jar, ...).
    #[arg(required = true)]
    archives: Vec<PathBuf>,

    /// Descriptors pushed next to the archives, without readiness checks.
    #[arg(long = "descriptor")]
    descriptors: Vec<PathBuf>,
}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let archives = LocalArchive::read_all(&self.archives).await?;
        let descriptors = LocalArchive::read_all(&self.descriptors).await?;

        let mut deployer = ctx.deployer()?;
        deployer.start().await?;

        let result = async {
            for descriptor in descriptors {
                deployer
                    .deploy_descriptor(&descriptor.name, descriptor.content)
                    .await?;
            }
            deploy_all(&deployer, archives).await
        }
        .await;
        let stopped = deployer.stop().await;

        let contexts = result?;
        stopped?;

        print_contexts(&contexts, ctx.format);
        if ctx.format == crate::output::OutputFormat::Table {
            print_success(&format!("Deployed {} archive(s)", contexts.len()));
        }
        Ok(())
    }
}
