//! Error types for the deployment repository.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by repository operations.
///
/// Each public operation maps `git2` failures onto one of these kinds.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The remote repository could not be cloned.
    #[error("unable to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    /// A path could not be added to or removed from the index.
    #[error("unable to stage {path}: {source}")]
    Stage {
        path: String,
        #[source]
        source: git2::Error,
    },

    /// The index could not be committed.
    #[error("unable to commit into Git repository: {0}")]
    Commit(#[source] git2::Error),

    /// Pushing to the remote failed.
    #[error("unable to push to {remote}: {source}")]
    Push {
        remote: String,
        #[source]
        source: git2::Error,
    },

    /// The remote refused a reference update.
    #[error("remote rejected {refname}: {reason}")]
    PushRejected { refname: String, reason: String },

    /// A branch could not be created, switched to, deleted or renamed.
    #[error("unable to update branch <{branch}>: {source}")]
    Branch {
        branch: String,
        #[source]
        source: git2::Error,
    },

    /// The operation is not valid in the repository's current state.
    #[error("invalid repository state: {0}")]
    InvalidState(String),

    /// A deployment path escapes the deployment directory.
    #[error("invalid deployment path: {0}")]
    InvalidPath(String),

    /// Writing the working copy failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials are misconfigured.
    #[error("invalid Git credentials: {0}")]
    Credentials(String),
}

impl RepositoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
