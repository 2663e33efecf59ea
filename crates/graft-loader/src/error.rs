//! Error types for discovery and activation.

use std::path::PathBuf;

use graft_core::{BoxError, OrderingError, PackageError, ResolveError};
use thiserror::Error;

/// Fatal discovery failures.
///
/// Everything else that can go wrong during discovery (bad descriptors,
/// duplicate ids, unreadable packages) is logged and skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Something other than a directory occupies the plugins path.
    #[error("plugins path {path} exists but is not a directory")]
    NotADirectory {
        /// The configured plugins directory.
        path: PathBuf,
    },

    /// The plugins directory is missing and could not be created.
    #[error("failed to create plugins directory {path}: {source}")]
    CreateDir {
        /// The configured plugins directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The plugins directory could not be listed.
    #[error("failed to read plugins directory {path}: {source}")]
    ReadDir {
        /// The configured plugins directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A failure while activating one plugin. Aborts the load pass.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// The plugin's package could not be opened for its namespace.
    #[error("failed to open package for plugin '{plugin}': {source}")]
    Package {
        plugin: String,
        #[source]
        source: PackageError,
    },

    /// The patch collaborator reported a failure.
    #[error("failed to apply patches for plugin '{plugin}': {source}")]
    Patch {
        plugin: String,
        #[source]
        source: BoxError,
    },

    /// An entry-point name did not resolve in the plugin's namespace.
    #[error("failed to resolve entry point for plugin '{plugin}': {source}")]
    Resolve {
        plugin: String,
        #[source]
        source: ResolveError,
    },

    /// The entry point's constructor failed.
    #[error("failed to construct entry point '{entry_point}' of plugin '{plugin}': {source}")]
    Construct {
        plugin: String,
        entry_point: String,
        #[source]
        source: BoxError,
    },

    /// The entry point's initialiser failed.
    #[error("entry point '{entry_point}' of plugin '{plugin}' failed to initialize: {source}")]
    Initialize {
        plugin: String,
        entry_point: String,
        #[source]
        source: BoxError,
    },

    /// Plugin code panicked during construction or initialisation.
    #[error("entry point '{entry_point}' of plugin '{plugin}' panicked: {message}")]
    Panic {
        plugin: String,
        entry_point: String,
        message: String,
    },
}

impl ActivationError {
    /// Id of the plugin whose activation failed.
    pub fn plugin(&self) -> &str {
        match self {
            Self::Package { plugin, .. }
            | Self::Patch { plugin, .. }
            | Self::Resolve { plugin, .. }
            | Self::Construct { plugin, .. }
            | Self::Initialize { plugin, .. }
            | Self::Panic { plugin, .. } => plugin,
        }
    }
}

/// Errors returned by [`PluginManager::initialize`](crate::PluginManager::initialize).
#[derive(Debug, Error)]
pub enum LoaderError {
    /// `initialize` was already called on this manager.
    #[error("plugin manager is already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Activation(#[from] ActivationError),
}
