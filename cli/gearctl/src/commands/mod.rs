//! CLI commands.

mod config;
mod deploy;
mod session;
mod topology;
mod undeploy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gearctl::config::{ConfigError, DeployerConfig};
use gearctl::{Deployer, HttpContext};
use gearpush_topology::TopologyRegistry;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_output, OutputFormat};

/// gearctl - Deploy archives to PaaS gears through Git.
#[derive(Debug, Parser)]
#[command(name = "gearctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags taking precedence over `GEARPUSH_*` variables.
#[derive(Debug, Args)]
struct ConfigOverrides {
    /// Namespace of the application.
    #[arg(long, global = true, env = "GEARPUSH_NAMESPACE")]
    namespace: Option<String>,

    /// Application name.
    #[arg(long, global = true, env = "GEARPUSH_APPLICATION")]
    application: Option<String>,

    /// Broker login.
    #[arg(long, global = true, env = "GEARPUSH_LOGIN")]
    login: Option<String>,

    /// User name in the Git remote URL.
    #[arg(long, global = true, env = "GEARPUSH_SSH_USER")]
    ssh_user: Option<String>,

    /// Cartridge type (jbossas-7, php-5.3, wsgi-3.2, perl-5.10, rack-1.1).
    #[arg(long, global = true, env = "GEARPUSH_CARTRIDGE")]
    cartridge: Option<String>,

    /// Git remote to use instead of the derived one.
    #[arg(long, global = true, env = "GEARPUSH_REMOTE_REPOSITORY")]
    remote: Option<String>,

    /// Seconds to wait for a deployment to become ready.
    #[arg(long, global = true, env = "GEARPUSH_DEPLOYMENT_TIMEOUT")]
    timeout: Option<u64>,
}

impl ConfigOverrides {
    /// Value given for the variable `key` on the command line.
    fn get(&self, key: &str) -> Option<String> {
        match key {
            "GEARPUSH_NAMESPACE" => self.namespace.clone(),
            "GEARPUSH_APPLICATION" => self.application.clone(),
            "GEARPUSH_LOGIN" => self.login.clone(),
            "GEARPUSH_SSH_USER" => self.ssh_user.clone(),
            "GEARPUSH_CARTRIDGE" => self.cartridge.clone(),
            "GEARPUSH_REMOTE_REPOSITORY" => self.remote.clone(),
            "GEARPUSH_DEPLOYMENT_TIMEOUT" => self.timeout.map(|secs| secs.to_string()),
            _ => None,
        }
    }

    /// Build the configuration, flags first, then `env`.
    fn config<F>(&self, env: F) -> Result<DeployerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        DeployerConfig::from_lookup(|key| self.get(key).or_else(|| env(key)))
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Deploy archives, print where they are served, then end the session.
    Deploy(deploy::DeployCommand),

    /// Remove deployments.
    Undeploy(undeploy::UndeployCommand),

    /// Deploy archives and keep them deployed until Ctrl+C.
    Session(session::SessionCommand),

    /// Show the nodes of the application's cluster.
    Topology(topology::TopologyCommand),

    /// Validate and show the effective configuration.
    Config(config::ConfigCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        if let Commands::Version = self.command {
            println!("gearctl {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let config = self.overrides.config(|key| std::env::var(key).ok())?;

        let ctx = CommandContext {
            config,
            format,
            registry: Arc::new(TopologyRegistry::new()),
        };

        match self.command {
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Undeploy(cmd) => cmd.run(ctx).await,
            Commands::Session(cmd) => cmd.run(ctx).await,
            Commands::Topology(cmd) => cmd.run(ctx).await,
            Commands::Config(cmd) => cmd.run(ctx).await,
            Commands::Version => Ok(()),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: DeployerConfig,
    pub format: OutputFormat,
    /// One registry for the whole process.
    pub registry: Arc<TopologyRegistry>,
}

impl CommandContext {
    /// A deployer for the configured application.
    pub fn deployer(&self) -> Result<Deployer> {
        Ok(Deployer::new(
            self.config.clone(),
            Arc::clone(&self.registry),
        )?)
    }
}

/// An archive read from disk.
pub struct LocalArchive {
    pub name: String,
    pub content: Vec<u8>,
}

impl LocalArchive {
    pub async fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no file name", path.display()))?
            .to_string();
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self { name, content })
    }

    pub async fn read_all(paths: &[PathBuf]) -> Result<Vec<Self>> {
        let mut archives = Vec::with_capacity(paths.len());
        for path in paths {
            archives.push(Self::read(path).await?);
        }
        Ok(archives)
    }
}

/// Deploy every archive, stopping at the first failure.
pub async fn deploy_all(
    deployer: &Deployer,
    archives: Vec<LocalArchive>,
) -> Result<Vec<(String, HttpContext)>> {
    let mut contexts = Vec::with_capacity(archives.len());
    for archive in archives {
        let context = deployer.deploy_archive(&archive.name, archive.content).await?;
        contexts.push((archive.name, context));
    }
    Ok(contexts)
}

/// One row per deployed web module.
#[derive(Debug, Serialize, Tabled)]
struct ContextRow {
    #[tabled(rename = "Archive")]
    archive: String,

    #[tabled(rename = "Context")]
    context: String,

    #[tabled(rename = "Module")]
    module: String,

    #[tabled(rename = "URL")]
    url: String,
}

pub fn print_contexts(contexts: &[(String, HttpContext)], format: OutputFormat) {
    let mut rows = Vec::new();
    for (archive, context) in contexts {
        if context.modules.is_empty() {
            rows.push(ContextRow {
                archive: archive.clone(),
                context: context.name.clone(),
                module: "-".to_string(),
                url: context.base_url(),
            });
        }
        for module in &context.modules {
            rows.push(ContextRow {
                archive: archive.clone(),
                context: context.name.clone(),
                module: module.archive.clone(),
                url: format!("{}{}", context.base_url(), module.path()),
            });
        }
    }
    print_output(&rows, format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_flags_only() {
        let cli = Cli::try_parse_from([
            "gearctl",
            "--namespace",
            "ns",
            "--application",
            "app",
            "--login",
            "me@example.com",
            "--ssh-user",
            "0123abcd",
            "--timeout",
            "30",
            "config",
        ])
        .unwrap();

        let config = cli.overrides.config(|_| None).unwrap();
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.application, "app");
        assert_eq!(config.login, "me@example.com");
        assert_eq!(config.ssh_user_name, "0123abcd");
        assert_eq!(config.deployment_timeout.as_secs(), 30);
    }

    #[test]
    fn test_flags_win_over_environment() {
        let cli = Cli::try_parse_from(["gearctl", "--application", "flagged", "config"]).unwrap();

        let config = cli
            .overrides
            .config(|key| match key {
                "GEARPUSH_NAMESPACE" => Some("ns".into()),
                "GEARPUSH_APPLICATION" => Some("from-env".into()),
                "GEARPUSH_LOGIN" => Some("me@example.com".into()),
                "GEARPUSH_SSH_USER" => Some("0123abcd".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.application, "flagged");
        assert_eq!(config.namespace, "ns");
    }

    #[test]
    fn test_missing_setting_is_reported() {
        let cli = Cli::try_parse_from(["gearctl", "--namespace", "ns", "config"]).unwrap();

        let err = cli.overrides.config(|_| None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "GEARPUSH_APPLICATION"
            }
        ));
    }
}
