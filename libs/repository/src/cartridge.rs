//! Supported cartridges.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A cartridge name that no variant matches.
#[derive(Debug, Clone, Error)]
#[error("unknown cartridge type {0}")]
pub struct UnknownCartridge(pub String);

/// Runtime cartridge of the application.
///
/// Each cartridge watches a fixed location of the repository for new
/// artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartridgeType {
    JbossAs7,
    Php53,
    Wsgi32,
    Perl510,
    Rack11,
}

impl CartridgeType {
    /// Canonical cartridge name.
    pub fn name(&self) -> &'static str {
        match self {
            CartridgeType::JbossAs7 => "jbossas-7",
            CartridgeType::Php53 => "php-5.3",
            CartridgeType::Wsgi32 => "wsgi-3.2",
            CartridgeType::Perl510 => "perl-5.10",
            CartridgeType::Rack11 => "rack-1.1",
        }
    }

    /// Repository directory scanned for deployments, empty for the root.
    pub fn deployment_dir(&self) -> &'static str {
        match self {
            CartridgeType::JbossAs7 => "deployments/",
            _ => "",
        }
    }

    /// Gear component name reported by the broker for this cartridge.
    pub fn gear_component(&self) -> &'static str {
        self.name()
    }

    /// Only the application server builds from sources and exposes a
    /// deployment check endpoint.
    pub fn is_application_server(&self) -> bool {
        matches!(self, CartridgeType::JbossAs7)
    }
}

impl FromStr for CartridgeType {
    type Err = UnknownCartridge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "jbossas-7" | "jbossas-7.0" => Ok(CartridgeType::JbossAs7),
            "php-5.3" => Ok(CartridgeType::Php53),
            "wsgi-3.2" => Ok(CartridgeType::Wsgi32),
            "perl-5.10" => Ok(CartridgeType::Perl510),
            "rack-1.1" => Ok(CartridgeType::Rack11),
            other => Err(UnknownCartridge(other.to_string())),
        }
    }
}

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
