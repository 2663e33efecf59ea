//! Error types shared by the graft core components.
//!
//! Loader-level errors (discovery and activation) live in `graft-loader`;
//! the types here describe failures of the metadata model, the environment
//! filter, the ordering resolver and symbol resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Error type crossing the boundary into plugin code.
///
/// Entry-point constructors and initialisers return this so plugins can use
/// any error type they like.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Environment Errors
// =============================================================================

/// A descriptor or configuration value did not name a known environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid environment '{0}', expected one of: client, server, both")]
pub struct InvalidEnvironment(pub String);

/// The configured loading mode is not `client` or `server`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid loading mode '{0}', expected one of: client, server")]
pub struct InvalidLoadingMode(pub String);

// =============================================================================
// Package / Descriptor Errors
// =============================================================================

/// Errors raised while reading a plugin package archive.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The package could not be opened.
    #[error("failed to open package {path}: {source}")]
    Open {
        /// Path of the package.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable archive.
    #[error("invalid package archive {path}: {source}")]
    Archive {
        /// Path of the package.
        path: PathBuf,
        /// Underlying archive error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry exists but could not be read.
    #[error("failed to read entry '{entry}' in {path}: {source}")]
    Entry {
        /// Path of the package.
        path: PathBuf,
        /// Name of the entry inside the package.
        entry: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An entry is larger than the reader accepts.
    #[error("entry '{entry}' in {path} exceeds {limit} bytes")]
    EntryTooLarge {
        /// Path of the package.
        path: PathBuf,
        /// Name of the entry inside the package.
        entry: String,
        /// Size limit in bytes.
        limit: u64,
    },
}

/// Errors raised while turning descriptor bytes into [`Metadata`](crate::Metadata).
///
/// These never escape discovery: every variant is a recoverable skip.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The package itself was unreadable.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The descriptor is not valid YAML.
    #[error("descriptor is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The descriptor parsed, but its top level is not a mapping.
    #[error("descriptor must be a mapping of keys to values")]
    NotAMapping,

    /// The `environment` key holds an unknown value.
    #[error(transparent)]
    Environment(#[from] InvalidEnvironment),

    /// The descriptor fields do not form a valid record.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Errors raised by [`MetadataBuilder::build`](crate::MetadataBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No id was supplied; every record needs one.
    #[error("plugin metadata is missing the mandatory 'id' field")]
    MissingId,

    /// The id cannot name a config directory: it is `.`/`..`, absolute, or
    /// contains a path separator.
    #[error("invalid plugin id '{0}': ids must be a single path segment")]
    InvalidId(String),
}

// =============================================================================
// Ordering Errors
// =============================================================================

/// The resolver could not produce a total order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// The parent/dependency graph contains at least one cycle.
    #[error("plugin dependency cycle detected among: {}", ids.join(", "))]
    Cycle {
        /// Ids of every record that could not be placed.
        ids: Vec<String>,
    },
}

// =============================================================================
// Symbol Resolution Errors
// =============================================================================

/// Errors raised when looking up an entry point by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No registered entry point has this name.
    #[error("entry point '{name}' is not registered")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// The entry point exists but belongs to another plugin's namespace.
    #[error("entry point '{name}' belongs to plugin '{owner}' and is not visible here")]
    NotVisible {
        /// The requested name.
        name: String,
        /// Plugin id that owns the symbol.
        owner: String,
    },
}
