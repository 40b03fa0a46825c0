//! High-level Git operations on a non-bare working copy.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, CertificateCheckStatus, Commit, FetchOptions, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use tracing::{debug, info};

use crate::credentials::CredentialsProvider;
use crate::error::RepositoryError;

/// Remote every push goes to.
const REMOTE: &str = "origin";

/// Credential callbacks give up after this many attempts.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// A cloned repository plus the credentials used to talk to its remote.
pub struct GitWorkspace {
    repo: Repository,
    workdir: PathBuf,
    remote_url: String,
    credentials: Arc<dyn CredentialsProvider>,
}

impl GitWorkspace {
    /// Clone `url` into `dir`.
    pub fn clone_into(
        url: &str,
        dir: &Path,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, RepositoryError> {
        debug!(url = %url, path = %dir.display(), "Cloning remote repository");

        let attempts = Cell::new(0);
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks(credentials.as_ref(), &attempts));

        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, dir)
            .map_err(|source| RepositoryError::Clone {
                url: url.to_string(),
                source,
            })?;

        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| RepositoryError::InvalidState("cloned repository is bare".into()))?;

        info!(url = %url, path = %workdir.display(), "Cloned remote repository");

        Ok(Self {
            repo,
            workdir,
            remote_url: url.to_string(),
            credentials,
        })
    }

    /// Root of the working copy.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Whether `relative` exists in the working copy.
    pub fn file_exists(&self, relative: &str) -> bool {
        self.workdir.join(relative).exists()
    }

    /// Stage a file of the working copy.
    pub fn add(&self, relative: &str) -> Result<(), RepositoryError> {
        let stage = |source| RepositoryError::Stage {
            path: relative.to_string(),
            source,
        };

        let mut index = self.repo.index().map_err(stage)?;
        index.add_path(Path::new(relative)).map_err(stage)?;
        index.write().map_err(stage)?;

        debug!(path = %relative, "Staged file");
        Ok(())
    }

    /// Delete a file from the working copy and stage the removal.
    ///
    /// Paths that are neither tracked nor present are ignored.
    pub fn remove(&self, relative: &str) -> Result<(), RepositoryError> {
        let stage = |source| RepositoryError::Stage {
            path: relative.to_string(),
            source,
        };

        let mut index = self.repo.index().map_err(stage)?;
        index.remove_path(Path::new(relative)).map_err(stage)?;
        index.write().map_err(stage)?;

        let path = self.workdir.join(relative);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| RepositoryError::io(&path, e))?;
        }

        debug!(path = %relative, "Removed file");
        Ok(())
    }

    /// Commit the index on top of HEAD.
    pub fn commit(&self, author: &Signature<'_>, message: &str) -> Result<git2::Oid, RepositoryError> {
        let mut index = self.repo.index().map_err(RepositoryError::Commit)?;
        let tree_id = index.write_tree().map_err(RepositoryError::Commit)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(RepositoryError::Commit)?;

        // An unborn HEAD has no parent.
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), author, author, message, &tree, &parents)
            .map_err(RepositoryError::Commit)?;

        debug!(commit = %oid, message = %message, "Committed");
        Ok(oid)
    }

    /// Name of the branch HEAD points at.
    pub fn current_branch(&self) -> Result<String, RepositoryError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|source| RepositoryError::Branch {
                branch: "HEAD".into(),
                source,
            })?;

        head.symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(str::to_string)
            .ok_or_else(|| RepositoryError::InvalidState("HEAD is not on a branch".into()))
    }

    /// Push the current branch to its counterpart on the remote.
    pub fn push(&self, force: bool) -> Result<(), RepositoryError> {
        let branch = self.current_branch()?;
        let refspec = format!(
            "{}refs/heads/{branch}:refs/heads/{branch}",
            if force { "+" } else { "" }
        );

        let push_failed = |source| RepositoryError::Push {
            remote: self.remote_url.clone(),
            source,
        };

        let mut remote = self.repo.find_remote(REMOTE).map_err(push_failed)?;

        let attempts = Cell::new(0);
        let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);
        {
            let mut callbacks = remote_callbacks(self.credentials.as_ref(), &attempts);
            callbacks.push_update_reference(|refname, status| {
                if let Some(reason) = status {
                    *rejection.borrow_mut() = Some((refname.to_string(), reason.to_string()));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(push_failed)?;
        }

        if let Some((refname, reason)) = rejection.into_inner() {
            return Err(RepositoryError::PushRejected { refname, reason });
        }

        info!(remote = %self.remote_url, branch = %branch, force, "Pushed to remote repository");
        Ok(())
    }

    /// Create a branch at HEAD without switching to it.
    pub fn create_branch(&self, name: &str) -> Result<(), RepositoryError> {
        let branch_failed = |source| RepositoryError::Branch {
            branch: name.to_string(),
            source,
        };

        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(branch_failed)?;
        self.repo.branch(name, &head, false).map_err(branch_failed)?;

        debug!(branch = %name, commit = %head.id(), "Created branch");
        Ok(())
    }

    /// Make `name` the primary branch and force-push it.
    ///
    /// Checks out `name`, deletes the branch HEAD was on, renames `name` to
    /// the old branch's name and force-pushes it.
    pub fn restore_from_branch(&self, name: &str) -> Result<(), RepositoryError> {
        let branch_failed = |source| RepositoryError::Branch {
            branch: name.to_string(),
            source,
        };

        let primary = self.current_branch()?;
        if primary == name {
            return Err(RepositoryError::InvalidState(format!(
                "branch <{name}> is already checked out"
            )));
        }

        let saved = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(branch_failed)?;
        let saved_ref = saved
            .get()
            .name()
            .map(str::to_string)
            .ok_or_else(|| RepositoryError::InvalidState(format!("branch <{name}> is not UTF-8")))?;
        let commit = saved.get().peel_to_commit().map_err(branch_failed)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(branch_failed)?;
        self.repo.set_head(&saved_ref).map_err(branch_failed)?;

        self.repo
            .find_branch(&primary, BranchType::Local)
            .and_then(|mut b| b.delete())
            .map_err(branch_failed)?;

        let mut saved = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(branch_failed)?;
        saved.rename(&primary, true).map_err(branch_failed)?;
        self.repo
            .set_head(&format!("refs/heads/{primary}"))
            .map_err(branch_failed)?;

        debug!(branch = %name, primary = %primary, commit = %commit.id(), "Restored branch");
        self.push(true)
    }

    /// Paths currently tracked by the index.
    pub fn tracked_files(&self) -> Result<Vec<String>, RepositoryError> {
        let index = self.repo.index().map_err(|source| RepositoryError::Stage {
            path: String::new(),
            source,
        })?;

        Ok(index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect())
    }
}

/// Callbacks answering credential prompts and host checks from `provider`.
fn remote_callbacks<'a>(
    provider: &'a dyn CredentialsProvider,
    attempts: &'a Cell<u32>,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        let attempt = attempts.get() + 1;
        attempts.set(attempt);
        if attempt > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication to {url} failed after {MAX_CREDENTIAL_ATTEMPTS} attempts"
            )));
        }
        provider.credentials(url, username_from_url, allowed)
    });

    callbacks.certificate_check(move |_cert, host| {
        if provider.accepts_unverified_host() {
            debug!(host = %host, "Accepting unverified host");
            Ok(CertificateCheckStatus::CertificateOk)
        } else {
            Ok(CertificateCheckStatus::CertificatePassthrough)
        }
    });

    callbacks
}
