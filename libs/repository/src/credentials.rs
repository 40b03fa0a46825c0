//! Credentials for talking to the remote repository.

use std::fs::File;
use std::path::{Path, PathBuf};

use git2::{Cred, CredentialType};
use tracing::{debug, warn};

use crate::error::RepositoryError;

/// Supplies secrets to Git transports on demand.
pub trait CredentialsProvider: Send + Sync {
    /// Produce a credential of one of the `allowed` kinds for `url`.
    fn credentials(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error>;

    /// Accept host keys and certificates that cannot be verified.
    fn accepts_unverified_host(&self) -> bool {
        false
    }
}

/// Credentials taken from deployer configuration.
///
/// SSH keys come from the identity file when one is configured and from the
/// SSH agent otherwise. Plain user/password is only offered when a password
/// is configured.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredCredentials {
    identity_file: Option<PathBuf>,
    passphrase: Option<String>,
    username: Option<String>,
    password: Option<String>,
    disable_strict_host_checking: bool,
}

impl ConfiguredCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a private key file, failing if it cannot be read.
    pub fn with_identity_file(
        mut self,
        path: impl AsRef<Path>,
        passphrase: Option<String>,
    ) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        File::open(path).map_err(|e| {
            RepositoryError::Credentials(format!(
                "identity file {} must be a readable file: {e}",
                path.display()
            ))
        })?;

        self.identity_file = Some(path.to_path_buf());
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        Ok(self)
    }

    /// User name used when the URL does not carry one.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Password for transports asking for plain user/password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Skip host key verification.
    pub fn disable_strict_host_checking(mut self) -> Self {
        warn!("Strict host key checking disabled, connections are open to man-in-the-middle attacks");
        self.disable_strict_host_checking = true;
        self
    }

    fn username_for<'a>(&'a self, username_from_url: Option<&'a str>) -> &'a str {
        username_from_url
            .or(self.username.as_deref())
            .unwrap_or("git")
    }
}

impl CredentialsProvider for ConfiguredCredentials {
    fn credentials(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error> {
        let username = self.username_for(username_from_url);
        debug!(url = %url, username = %username, allowed = ?allowed, "Git requests credentials");

        if allowed.contains(CredentialType::SSH_KEY) {
            return match &self.identity_file {
                Some(key) => Cred::ssh_key(username, None, key, self.passphrase.as_deref()),
                None => Cred::ssh_key_from_agent(username),
            };
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(password) = &self.password {
                return Cred::userpass_plaintext(username, password);
            }
        }

        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(username);
        }

        if allowed.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        Err(git2::Error::from_str(&format!(
            "no configured credentials satisfy {url}"
        )))
    }

    fn accepts_unverified_host(&self) -> bool {
        self.disable_strict_host_checking
    }
}
