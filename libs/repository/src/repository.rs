//! The deployment repository.
//!
//! Reference lifecycle: a value exists only once the remote has been cloned,
//! so every method runs against a ready working copy. The clone lives in a
//! temporary directory that is removed when the repository is dropped.
//!
//! Mutations (`add`, `remove`, lifecycle markers) always end in a local
//! commit. Pushing is separate: a failed push keeps the local commits and can
//! be retried.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};
use std::sync::Arc;

use git2::Signature;
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cartridge::CartridgeType;
use crate::credentials::CredentialsProvider;
use crate::error::RepositoryError;
use crate::git::GitWorkspace;
use crate::markers::{Markers, DEPLOYED_SUFFIX, DODEPLOY_SUFFIX};

/// Build descriptor whose presence means the platform builds from sources.
pub const SOURCE_BUILD_DESCRIPTOR: &str = "pom.xml";

const AUTHOR_NAME: &str = "gearpush deployer";
const AUTHOR_EMAIL: &str = "deployer@gearpush.dev";

/// Where to clone from and how deployments are laid out.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub remote_url: String,
    pub cartridge: CartridgeType,
}

/// Local clone used to push deployments.
pub struct DeploymentRepository {
    git: GitWorkspace,
    config: RepositoryConfig,
    /// Deployment paths added through this repository, in insertion order.
    deployments: Vec<String>,
    last_saved_state: Option<String>,
    /// Deployment list captured with each saved state.
    snapshots: HashMap<String, Vec<String>>,
    /// Declared last so the working copy outlives the open repository.
    _workdir: TempDir,
}

impl DeploymentRepository {
    /// Clone the remote into a fresh temporary directory.
    pub fn clone_remote(
        config: RepositoryConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, RepositoryError> {
        let workdir = tempfile::Builder::new()
            .prefix("gearpush-")
            .tempdir()
            .map_err(|e| RepositoryError::io(std::env::temp_dir(), e))?;

        let git = GitWorkspace::clone_into(&config.remote_url, workdir.path(), credentials)?;

        Ok(Self {
            git,
            config,
            deployments: Vec::new(),
            last_saved_state: None,
            snapshots: HashMap::new(),
            _workdir: workdir,
        })
    }

    pub fn cartridge(&self) -> CartridgeType {
        self.config.cartridge
    }

    pub fn remote_url(&self) -> &str {
        &self.config.remote_url
    }

    /// Root of the local clone.
    pub fn workdir(&self) -> &Path {
        self.git.workdir()
    }

    /// Deployments added and not yet removed.
    pub fn deployments(&self) -> &[String] {
        &self.deployments
    }

    pub fn is_deployed(&self, path: &str) -> bool {
        self.deployments.iter().any(|d| d == path)
    }

    /// Branch recorded by the latest [`save_state`](Self::save_state).
    pub fn last_saved_state(&self) -> Option<&str> {
        self.last_saved_state.as_deref()
    }

    /// Paths tracked by the clone's index.
    pub fn tracked_files(&self) -> Result<Vec<String>, RepositoryError> {
        self.git.tracked_files()
    }

    /// Repository-relative location of a deployment.
    pub fn deployment_path(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.cartridge.deployment_dir(),
            path.trim_start_matches('/')
        )
    }

    /// Whether the platform builds this application from sources.
    pub fn has_source_build(&self) -> bool {
        self.config.cartridge.is_application_server()
            && self.git.file_exists(SOURCE_BUILD_DESCRIPTOR)
    }

    /// Commit the skip-build marker. Not pushed; the next push carries it.
    pub fn mark_lifecycle(&mut self) -> Result<(), RepositoryError> {
        Markers::new(&self.git).mark_lifecycle()?;
        self.commit("Starting deployment session")?;
        Ok(())
    }

    /// Commit the removal of the skip-build marker. Not pushed.
    pub fn unmark_lifecycle(&mut self) -> Result<(), RepositoryError> {
        Markers::new(&self.git).unmark_lifecycle()?;
        self.commit("Stopping deployment session")?;
        Ok(())
    }

    /// Write `content` under the deployment directory, mark it for
    /// deployment and commit both.
    pub fn add(&mut self, path: &str, content: &[u8]) -> Result<(), RepositoryError> {
        validate_path(path)?;
        let relative = self.deployment_path(path);

        let target = self.git.workdir().join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| RepositoryError::io(&target, e))?;
        debug!(path = %relative, bytes = content.len(), "Copied deployment to working copy");

        self.git.add(&relative)?;
        Markers::new(&self.git).mark(&format!("{relative}{DODEPLOY_SUFFIX}"))?;
        self.commit(&format!("Preparing {path} for deployment"))?;

        if !self.is_deployed(path) {
            self.deployments.push(path.to_string());
        }
        Ok(())
    }

    /// [`add`](Self::add) followed by [`push`](Self::push).
    pub fn add_and_push(&mut self, path: &str, content: &[u8]) -> Result<(), RepositoryError> {
        self.add(path, content)?;
        self.push()
    }

    /// Remove a deployment and both of its markers, and commit.
    pub fn remove(&mut self, path: &str) -> Result<(), RepositoryError> {
        validate_path(path)?;
        let relative = self.deployment_path(path);

        self.git.remove(&relative)?;
        let markers = Markers::new(&self.git);
        markers.unmark(&format!("{relative}{DODEPLOY_SUFFIX}"))?;
        markers.unmark(&format!("{relative}{DEPLOYED_SUFFIX}"))?;
        self.commit(&format!("Removing {path} deployment"))?;

        self.deployments.retain(|d| d != path);
        Ok(())
    }

    /// [`remove`](Self::remove) followed by [`push`](Self::push).
    pub fn remove_and_push(&mut self, path: &str) -> Result<(), RepositoryError> {
        self.remove(path)?;
        self.push()
    }

    /// Push local commits of the current branch.
    pub fn push(&self) -> Result<(), RepositoryError> {
        self.git.push(false)
    }

    /// Save HEAD on a new uniquely named branch and return its name.
    pub fn save_state(&mut self) -> Result<String, RepositoryError> {
        let token = Uuid::new_v4().to_string();
        self.git.create_branch(&token)?;

        self.snapshots.insert(token.clone(), self.deployments.clone());
        self.last_saved_state = Some(token.clone());
        info!(branch = %token, "Saved repository state");
        Ok(token)
    }

    /// Reset the local and remote primary branch to a saved state.
    pub fn load_state(&mut self, token: &str) -> Result<(), RepositoryError> {
        if token.trim().is_empty() {
            return Err(RepositoryError::InvalidState(
                "the branch used to load state from must not be empty".into(),
            ));
        }

        self.git.restore_from_branch(token)?;

        if let Some(deployments) = self.snapshots.remove(token) {
            self.deployments = deployments;
        }
        if self.last_saved_state.as_deref() == Some(token) {
            self.last_saved_state = None;
        }
        info!(branch = %token, "Loaded repository state");
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), RepositoryError> {
        let author = Signature::now(AUTHOR_NAME, AUTHOR_EMAIL).map_err(RepositoryError::Commit)?;
        self.git.commit(&author, message)?;
        Ok(())
    }
}

/// Deployment paths stay inside the deployment directory.
fn validate_path(path: &str) -> Result<(), RepositoryError> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(RepositoryError::InvalidPath("path must not be empty".into()));
    }

    let escapes = Path::new(trimmed)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(RepositoryError::InvalidPath(path.to_string()));
    }
    Ok(())
}
