//! Zero-byte marker files.
//!
//! The platform reacts to the presence of these files in the pushed tree:
//! `<artifact>.dodeploy` requests a deployment, `<artifact>.deployed` is left
//! behind once deployed, and the skip-build marker suppresses the source
//! build for the duration of a test session.

use std::fs::{self, File};

use crate::error::RepositoryError;
use crate::git::GitWorkspace;

/// Suppresses the platform's source build while present.
pub const SKIP_BUILD_MARKER: &str = ".openshift/markers/skip_maven_build";

/// Suffix requesting deployment of an artifact.
pub const DODEPLOY_SUFFIX: &str = ".dodeploy";

/// Suffix reporting a deployed artifact.
pub const DEPLOYED_SUFFIX: &str = ".deployed";

/// Writes and removes marker files in a workspace.
pub struct Markers<'a> {
    git: &'a GitWorkspace,
}

impl<'a> Markers<'a> {
    pub fn new(git: &'a GitWorkspace) -> Self {
        Self { git }
    }

    /// Create an empty file at `name` and stage it.
    pub fn mark(&self, name: &str) -> Result<(), RepositoryError> {
        let path = self.git.workdir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;
        }
        File::create(&path).map_err(|e| RepositoryError::io(&path, e))?;

        self.git.add(name)
    }

    /// Remove the file at `name` and stage the removal.
    pub fn unmark(&self, name: &str) -> Result<(), RepositoryError> {
        self.git.remove(name)
    }

    pub fn mark_lifecycle(&self) -> Result<(), RepositoryError> {
        self.mark(SKIP_BUILD_MARKER)
    }

    pub fn unmark_lifecycle(&self) -> Result<(), RepositoryError> {
        self.unmark(SKIP_BUILD_MARKER)
    }
}
