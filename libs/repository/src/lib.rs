//! # gearpush-repository
//!
//! A local clone of an application's Git repository, used as the deployment
//! channel: artifacts are copied under the cartridge's deployment directory,
//! committed next to zero-byte marker files, and pushed. The platform picks up
//! the push and deploys whatever the markers ask for.
//!
//! ## Modules
//!
//! - `cartridge`: supported cartridges and where they watch for artifacts
//! - `credentials`: credentials and host-key policy for clone and push
//! - `git`: thin high-level API over `git2`
//! - `markers`: marker files (`.dodeploy`, `.deployed`, skip-build)
//! - `repository`: the deployment repository itself

mod cartridge;
mod credentials;
mod error;
mod git;
mod markers;
mod repository;

pub use cartridge::{CartridgeType, UnknownCartridge};
pub use credentials::{ConfiguredCredentials, CredentialsProvider};
pub use error::RepositoryError;
pub use git::GitWorkspace;
pub use markers::{Markers, DEPLOYED_SUFFIX, DODEPLOY_SUFFIX, SKIP_BUILD_MARKER};
pub use repository::{DeploymentRepository, RepositoryConfig, SOURCE_BUILD_DESCRIPTOR};
