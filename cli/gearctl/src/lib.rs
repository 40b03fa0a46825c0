//! # gearctl
//!
//! Deploys archives to an application's gears by pushing them to the
//! application's Git repository, waits until the platform serves them and
//! tells where they can be reached.
//!
//! ## Modules
//!
//! - `config`: `GEARPUSH_*` settings and the values derived from them
//! - `deployer`: start / deploy / undeploy / stop of one session
//! - `readiness`: polling until a deployment answers
//! - `context`: context roots and HTTP contexts of deployed archives
//! - `archive`: descriptors inside web and enterprise archives
//! - `error`: deployer errors and their display

pub mod archive;
pub mod config;
pub mod context;
pub mod deployer;
pub mod error;
pub mod readiness;

pub use config::{ConfigError, DeployerConfig};
pub use context::HttpContext;
pub use deployer::Deployer;
pub use error::DeployError;
