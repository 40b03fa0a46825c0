//! Undeploy command.

use anyhow::Result;
use clap::Args;

use crate::output::print_success;

use super::CommandContext;

/// Remove deployments by name.
#[derive(Debug, Args)]
pub struct UndeployCommand {
    /// Names of deployed archives (e.g. app.war).
    #[arg(required = true)]
    names: Vec<String>,
}

impl UndeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut deployer = ctx.deployer()?;
        deployer.start().await?;

        let result = async {
            for name in &self.names {
                deployer.undeploy(name).await?;
            }
            Ok::<_, anyhow::Error>(())
        }
        .await;
        let stopped = deployer.stop().await;

        result?;
        stopped?;

        print_success(&format!("Removed {}", self.names.join(", ")));
        Ok(())
    }
}
