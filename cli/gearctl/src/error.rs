//! Error handling and display.

use std::time::Duration;

use colored::Colorize;
use gearpush_repository::RepositoryError;
use gearpush_topology::TopologyError;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::config::ConfigError;

/// Errors raised while deploying.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A Git operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Cluster topology could not be read or a node could not be picked.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// A deployed archive could not be read.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The deployment did not become ready in time.
    #[error(
        "deployment {archive} is not available at {url} after {}s",
        .timeout.as_secs()
    )]
    NotReady {
        url: String,
        archive: String,
        timeout: Duration,
    },

    /// An HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// An operation needs a started deployer.
    #[error("deployer is not started")]
    NotStarted,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let hint = match err.downcast_ref::<DeployError>() {
        Some(deploy_err) => hint(deploy_err),
        None => err
            .downcast_ref::<ConfigError>()
            .map(|_| "Hint: Run `gearctl config` to check the GEARPUSH_* settings."),
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", hint.yellow());
    }
}

fn hint(err: &DeployError) -> Option<&'static str> {
    match err {
        DeployError::Config(_) => {
            Some("Hint: Run `gearctl config` to check the GEARPUSH_* settings.")
        }
        DeployError::Repository(RepositoryError::Clone { .. })
        | DeployError::Repository(RepositoryError::Push { .. }) => Some(
            "Hint: Check GEARPUSH_SSH_USER and GEARPUSH_IDENTITY_FILE, and that your key is registered.",
        ),
        DeployError::Repository(RepositoryError::PushRejected { .. }) => {
            Some("Hint: The remote moved on. Start a new session to pick up its history.")
        }
        DeployError::Topology(TopologyError::Status { status: 401, .. }) => {
            Some("Hint: Check GEARPUSH_LOGIN and GEARPUSH_PASSPHRASE.")
        }
        DeployError::Topology(TopologyError::NodesExhausted { .. }) => {
            Some("Hint: Every node of the cluster is already claimed by a deployment.")
        }
        DeployError::NotReady { .. } => {
            Some("Hint: Raise GEARPUSH_DEPLOYMENT_TIMEOUT or check the application logs.")
        }
        _ => None,
    }
}
