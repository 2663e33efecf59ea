//! Execution environments and the loading mode that gates plugin admission.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{InvalidEnvironment, InvalidLoadingMode};

/// The side of the host a plugin is built for.
///
/// Parsing is case-insensitive and ignores surrounding whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Only loaded when the host runs as a client.
    Client,
    /// Only loaded when the host runs as a server.
    Server,
    /// Loaded in every mode.
    #[default]
    Both,
}

impl Environment {
    /// Returns the descriptor spelling of this environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
            Self::Both => "both",
        }
    }

    /// Returns `true` if a plugin declared for this environment may load
    /// under `mode`.
    pub fn admits(self, mode: LoadingMode) -> bool {
        match self {
            Self::Both => true,
            Self::Client => mode == LoadingMode::Client,
            Self::Server => mode == LoadingMode::Server,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = InvalidEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            "both" => Ok(Self::Both),
            _ => Err(InvalidEnvironment(s.to_string())),
        }
    }
}

/// The mode the host process was started in.
///
/// Set once at startup and never changed for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// The host is a client.
    Client,
    /// The host is a dedicated server.
    Server,
}

impl LoadingMode {
    /// Returns the configuration spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for LoadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadingMode {
    type Err = InvalidLoadingMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            _ => Err(InvalidLoadingMode(s.to_string())),
        }
    }
}

impl From<LoadingMode> for Environment {
    fn from(mode: LoadingMode) -> Self {
        match mode {
            LoadingMode::Client => Environment::Client,
            LoadingMode::Server => Environment::Server,
        }
    }
}
