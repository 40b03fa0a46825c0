//! Deployment sessions.
//!
//! A [`Deployer`] owns one clone of the application repository between
//! [`start`](Deployer::start) and [`stop`](Deployer::stop). Git work is
//! blocking; it runs on tokio's blocking pool, one operation at a time per
//! repository.

use std::path::Path;
use std::sync::{Arc, Mutex};

use gearpush_repository::{
    CartridgeType, CredentialsProvider, DeploymentRepository, RepositoryConfig, RepositoryError,
};
use gearpush_topology::{RestTopologyClient, TopologyRegistry, TopologySource};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{ConfigError, DeployerConfig};
use crate::context::{readiness_url, ContextResolver, HttpContext};
use crate::error::DeployError;
use crate::readiness::ReadinessProbe;

/// Archive answering readiness checks, deployed next to every archive.
#[derive(Debug, Clone)]
pub struct PingArchive {
    pub name: String,
    pub content: Vec<u8>,
}

impl PingArchive {
    /// Load the archive at `path`, named after its file name.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Invalid {
                var: "GEARPUSH_PING_ARCHIVE",
                value: path.display().to_string(),
                reason: "not a file name".into(),
            })?;

        let content = tokio::fs::read(path).await.map_err(|e| ConfigError::Invalid {
            var: "GEARPUSH_PING_ARCHIVE",
            value: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { name, content })
    }
}

type SharedRepository = Arc<Mutex<DeploymentRepository>>;

/// Drives one deployment session against an application's repository.
pub struct Deployer {
    config: DeployerConfig,
    credentials: Arc<dyn CredentialsProvider>,
    contexts: ContextResolver,
    probe: ReadinessProbe,
    ping: Option<PingArchive>,
    repository: Option<SharedRepository>,
}

impl Deployer {
    /// Create a deployer reading cluster topology from the broker.
    pub fn new(config: DeployerConfig, registry: Arc<TopologyRegistry>) -> Result<Self, DeployError> {
        let source = Arc::new(RestTopologyClient::new(config.rest_client_config())?);
        Self::with_topology_source(config, registry, source)
    }

    /// Create a deployer reading cluster topology from `source`.
    pub fn with_topology_source(
        config: DeployerConfig,
        registry: Arc<TopologyRegistry>,
        source: Arc<dyn TopologySource>,
    ) -> Result<Self, DeployError> {
        config.validate()?;

        let credentials: Arc<dyn CredentialsProvider> = Arc::new(config.credentials()?);
        let contexts = ContextResolver::new(
            config.host_name(),
            config.cluster_id(),
            config.proxy_requests,
            registry,
            source,
        );
        let probe = ReadinessProbe::new()?;

        Ok(Self {
            config,
            credentials,
            contexts,
            probe,
            ping: None,
            repository: None,
        })
    }

    /// Replace the readiness probe.
    pub fn with_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.repository.is_some()
    }

    /// Clone the repository and prepare it for the session.
    pub async fn start(&mut self) -> Result<(), DeployError> {
        if self.is_started() {
            warn!("Deployer already started");
            return Ok(());
        }

        if let Some(path) = &self.config.ping_archive {
            self.ping = Some(PingArchive::load(path).await?);
        }

        let repo_config = RepositoryConfig {
            remote_url: self.config.remote_repository_url(),
            cartridge: self.config.cartridge,
        };
        let credentials = Arc::clone(&self.credentials);
        let discard_history = self.config.discard_history;

        info!(remote = %repo_config.remote_url, cartridge = %repo_config.cartridge, "Starting deployer");

        let repository = tokio::task::spawn_blocking(move || {
            let mut repository = DeploymentRepository::clone_remote(repo_config, credentials)?;

            if discard_history {
                let token = repository.save_state()?;
                info!(branch = %token, "Repository history will be restored on stop");
            }
            if repository.has_source_build() {
                repository.mark_lifecycle()?;
            }
            Ok::<_, RepositoryError>(repository)
        })
        .await??;

        self.repository = Some(Arc::new(Mutex::new(repository)));
        Ok(())
    }

    /// Deploy an archive and wait until it is served.
    pub async fn deploy_archive(
        &self,
        name: &str,
        content: Vec<u8>,
    ) -> Result<HttpContext, DeployError> {
        // Fail on unreadable archives before anything is pushed.
        let outcome = crate::archive::inspect(name, &content)?;

        let ping = self.application_server_ping().cloned();
        let ping_name = ping.as_ref().map(|p| p.name.clone());
        {
            let name = name.to_string();
            self.with_repository(move |repository| {
                if let Some(ping) = ping {
                    repository.add(&ping.name, &ping.content)?;
                }
                repository.add_and_push(&name, &content)
            })
            .await?;
        }
        info!(archive = %name, "Pushed deployment");

        if let Some(ping_name) = ping_name {
            let url = readiness_url(&self.config.host_name(), &ping_name, name)?;
            let deadline = Instant::now() + self.config.deployment_timeout;

            if !self.probe.wait_until_ready(&url, deadline).await {
                return Err(DeployError::NotReady {
                    url,
                    archive: name.to_string(),
                    timeout: self.config.deployment_timeout,
                });
            }
            info!(archive = %name, "Deployment is ready");
        }

        self.contexts.resolve(name, outcome).await
    }

    /// Push a descriptor. Descriptors are not served, so nothing is awaited.
    pub async fn deploy_descriptor(&self, name: &str, content: Vec<u8>) -> Result<(), DeployError> {
        let name = name.to_string();
        self.with_repository(move |repository| repository.add_and_push(&name, &content))
            .await
    }

    /// Remove a deployment and push the removal.
    pub async fn undeploy(&self, name: &str) -> Result<(), DeployError> {
        let ping = self.application_server_ping().cloned();
        let target = name.to_string();
        self.with_repository(move |repository| {
            if let Some(ping) = ping {
                repository.remove(&ping.name)?;
            }
            repository.remove_and_push(&target)
        })
        .await?;

        info!(archive = %name, "Removed deployment");
        Ok(())
    }

    /// Undo the session's changes to the repository and drop the clone.
    pub async fn stop(&mut self) -> Result<(), DeployError> {
        let Some(repository) = self.repository.take() else {
            warn!("Deployer not started, nothing to stop");
            return Ok(());
        };
        let discard_history = self.config.discard_history;

        tokio::task::spawn_blocking(move || {
            let mut repository = lock(&repository)?;

            if repository.has_source_build() {
                repository.unmark_lifecycle()?;
            }

            match repository.last_saved_state().map(str::to_string) {
                Some(token) if discard_history => repository.load_state(&token),
                _ => repository.push(),
            }
        })
        .await??;

        info!("Stopped deployer");
        Ok(())
    }

    /// The ping archive, when the cartridge has a readiness endpoint.
    fn application_server_ping(&self) -> Option<&PingArchive> {
        match self.config.cartridge {
            CartridgeType::JbossAs7 => self.ping.as_ref(),
            _ => None,
        }
    }

    async fn with_repository<F, T>(&self, op: F) -> Result<T, DeployError>
    where
        F: FnOnce(&mut DeploymentRepository) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let repository = Arc::clone(self.repository.as_ref().ok_or(DeployError::NotStarted)?);

        let result = tokio::task::spawn_blocking(move || {
            let mut repository = lock(&repository)?;
            op(&mut repository)
        })
        .await??;
        Ok(result)
    }
}

fn lock(
    repository: &Mutex<DeploymentRepository>,
) -> Result<std::sync::MutexGuard<'_, DeploymentRepository>, RepositoryError> {
    repository
        .lock()
        .map_err(|_| RepositoryError::InvalidState("repository lock poisoned".into()))
}
