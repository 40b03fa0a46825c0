//! Deployer configuration.
//!
//! Everything is read from `GEARPUSH_*` environment variables. Reading never
//! touches the network or the file system; [`DeployerConfig::validate`] does
//! the eager checks and runs before a session starts.

use std::path::PathBuf;
use std::time::Duration;

use gearpush_repository::{CartridgeType, ConfiguredCredentials, RepositoryError, UnknownCartridge};
use gearpush_topology::RestClientConfig;
use reqwest::Url;
use thiserror::Error;

/// Default domain suffix of application host names.
pub const DEFAULT_DOMAIN: &str = "rhcloud.com";

/// Default broker REST endpoint.
pub const DEFAULT_REST_API_URL: &str = "https://openshift.redhat.com/broker/rest/";

/// Default time to wait for a deployment, in seconds.
pub const DEFAULT_DEPLOYMENT_TIMEOUT_SECS: u64 = 120;

const MASK: &str = "********";

/// Configuration errors, raised before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or blank.
    #[error("{var} must be set")]
    Missing { var: &'static str },

    /// A setting could not be parsed.
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The cartridge type is not supported.
    #[error(transparent)]
    Cartridge(#[from] UnknownCartridge),

    /// The identity file cannot be read.
    #[error("identity file {path} is not readable: {source}")]
    IdentityFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Git credentials cannot be built from the settings.
    #[error("invalid credentials: {0}")]
    Credentials(#[source] RepositoryError),

    /// A configured or derived URL is malformed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Settings of one deployer.
#[derive(Debug, Clone)]
pub struct DeployerConfig {
    pub namespace: String,
    pub application: String,
    /// Broker login, used for the REST API.
    pub login: String,
    /// User name in the Git remote URL.
    pub ssh_user_name: String,
    pub domain: String,
    pub cartridge: CartridgeType,
    /// Secret for the broker and for the identity file.
    pub passphrase: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub disable_strict_host_checking: bool,
    /// Address deployments through cluster nodes instead of the front host.
    pub proxy_requests: bool,
    pub deployment_timeout: Duration,
    pub rest_api_url: String,
    pub trust_all_ssl: bool,
    /// Save the repository before the session and restore it afterwards.
    pub discard_history: bool,
    /// Replaces the derived remote repository URL.
    pub remote_repository: Option<String>,
    /// Archive answering readiness checks on application servers.
    pub ping_archive: Option<PathBuf>,
    pub log_level: String,
}

impl DeployerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing { var: key });

        let namespace = required("GEARPUSH_NAMESPACE")?;
        let application = required("GEARPUSH_APPLICATION")?;
        let login = required("GEARPUSH_LOGIN")?;
        let ssh_user_name = required("GEARPUSH_SSH_USER")?;

        let domain = var("GEARPUSH_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

        let cartridge = match var("GEARPUSH_CARTRIDGE") {
            Some(name) => name.parse()?,
            None => CartridgeType::JbossAs7,
        };

        let passphrase = var("GEARPUSH_PASSPHRASE").or_else(|| var("SSH_PASSPHRASE"));
        let identity_file = var("GEARPUSH_IDENTITY_FILE").map(PathBuf::from);

        let flag = |key: &'static str| parse_flag(key, var(key));
        let disable_strict_host_checking = flag("GEARPUSH_DISABLE_STRICT_HOST_CHECKING")?;
        let proxy_requests = flag("GEARPUSH_PROXY_REQUESTS")?;
        let trust_all_ssl = flag("GEARPUSH_TRUST_ALL_SSL")?;
        let discard_history = flag("GEARPUSH_DISCARD_HISTORY")?;

        let deployment_timeout = match var("GEARPUSH_DEPLOYMENT_TIMEOUT") {
            Some(value) => {
                let secs = value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "GEARPUSH_DEPLOYMENT_TIMEOUT",
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_DEPLOYMENT_TIMEOUT_SECS),
        };

        let rest_api_url =
            var("GEARPUSH_REST_API_URL").unwrap_or_else(|| DEFAULT_REST_API_URL.to_string());

        let log_level = var("GEARPUSH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            namespace,
            application,
            login,
            ssh_user_name,
            domain,
            cartridge,
            passphrase,
            identity_file,
            disable_strict_host_checking,
            proxy_requests,
            deployment_timeout,
            rest_api_url,
            trust_all_ssl,
            discard_history,
            remote_repository: var("GEARPUSH_REMOTE_REPOSITORY"),
            ping_archive: var("GEARPUSH_PING_ARCHIVE").map(PathBuf::from),
            log_level,
        })
    }

    /// Check the configuration before anything talks to the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("GEARPUSH_NAMESPACE", &self.namespace),
            ("GEARPUSH_APPLICATION", &self.application),
            ("GEARPUSH_LOGIN", &self.login),
            ("GEARPUSH_SSH_USER", &self.ssh_user_name),
            ("GEARPUSH_DOMAIN", &self.domain),
        ];
        for (var, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { var });
            }
        }

        if let Some(path) = &self.identity_file {
            std::fs::File::open(path).map_err(|source| ConfigError::IdentityFile {
                path: path.clone(),
                source,
            })?;
        }

        if self.deployment_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "GEARPUSH_DEPLOYMENT_TIMEOUT",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        check_url(&self.rest_api_url)?;
        if !self.rest_api_url.ends_with('/') {
            return Err(ConfigError::InvalidUrl {
                url: self.rest_api_url.clone(),
                reason: "must end with '/'".into(),
            });
        }

        check_url(&self.root_url())?;
        // Overrides may be plain paths to local repositories.
        if self.remote_repository.is_none() {
            check_url(&self.remote_repository_url())?;
        }

        Ok(())
    }

    /// Public host name of the application.
    pub fn host_name(&self) -> String {
        format!("{}-{}.{}", self.application, self.namespace, self.domain)
    }

    /// Git remote the deployer clones and pushes to.
    pub fn remote_repository_url(&self) -> String {
        match &self.remote_repository {
            Some(url) => url.clone(),
            None => format!(
                "ssh://{}@{}/~/git/{}.git/",
                self.ssh_user_name,
                self.host_name(),
                self.application
            ),
        }
    }

    pub fn root_url(&self) -> String {
        format!("http://{}", self.host_name())
    }

    /// Identifier of the application's cluster in the topology registry.
    pub fn cluster_id(&self) -> String {
        format!("{}:{}:{}", self.domain, self.namespace, self.application)
    }

    /// Git credentials derived from the identity and host-check settings.
    pub fn credentials(&self) -> Result<ConfiguredCredentials, ConfigError> {
        let mut credentials = ConfiguredCredentials::new().with_username(&self.ssh_user_name);

        if let Some(path) = &self.identity_file {
            credentials = credentials
                .with_identity_file(path, self.passphrase.clone())
                .map_err(ConfigError::Credentials)?;
        }

        if self.disable_strict_host_checking {
            credentials = credentials.disable_strict_host_checking();
        }
        Ok(credentials)
    }

    /// Settings of the broker REST client.
    pub fn rest_client_config(&self) -> RestClientConfig {
        let mut config = RestClientConfig::new(
            &self.rest_api_url,
            &self.namespace,
            &self.application,
            &self.login,
        );
        config.passphrase = self.passphrase.clone();
        config.trust_all_ssl = self.trust_all_ssl;
        config.component = self.cartridge.gear_component().to_string();
        config
    }

    /// Effective settings for display, secrets masked.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

        vec![
            ("namespace", self.namespace.clone()),
            ("application", self.application.clone()),
            ("login", self.login.clone()),
            ("ssh_user", self.ssh_user_name.clone()),
            ("domain", self.domain.clone()),
            ("cartridge", self.cartridge.to_string()),
            ("passphrase", optional(self.passphrase.as_ref().map(|_| MASK.to_string()))),
            (
                "identity_file",
                optional(self.identity_file.as_ref().map(|p| p.display().to_string())),
            ),
            (
                "disable_strict_host_checking",
                self.disable_strict_host_checking.to_string(),
            ),
            ("proxy_requests", self.proxy_requests.to_string()),
            (
                "deployment_timeout",
                format!("{}s", self.deployment_timeout.as_secs()),
            ),
            ("rest_api_url", self.rest_api_url.clone()),
            ("trust_all_ssl", self.trust_all_ssl.to_string()),
            ("discard_history", self.discard_history.to_string()),
            ("host_name", self.host_name()),
            ("remote_repository", self.remote_repository_url()),
            ("cluster_id", self.cluster_id()),
            (
                "ping_archive",
                optional(self.ping_archive.as_ref().map(|p| p.display().to_string())),
            ),
            ("log_level", self.log_level.clone()),
        ]
    }
}

fn parse_flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected true or false".into(),
        }),
    }
}

fn check_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(())
}
