//! # Graft Loader
//!
//! Finds plugin packages, orders them and activates each one behind its own
//! namespace.
//!
//! The pipeline, driven by [`PluginManager::initialize`]:
//!
//! 1. [`PluginDiscovery`] collects records from the core package, synthesizes
//!    missing internal modules and scans the plugins directory.
//! 2. Records are ordered parent-first and dependency-first.
//! 3. Each record gets a [`PluginNamespace`], its patches are handed to the
//!    [`PatchApplier`] and its entry points are constructed and initialised.
//!
//! The collaborators the loader does not own ([`HostInfo`], [`PatchApplier`],
//! [`CodeSearchPath`]) are traits with simple default implementations.

pub mod discovery;
pub mod error;
pub mod host;
pub mod manager;
pub mod namespace;
pub mod patch;
pub mod search_path;

pub use discovery::{
    CORE_PLUGIN_ID, DEFAULT_CORE_PACKAGE, DEFAULT_PLUGINS_DIR, DiscoveryOptions, HOST_CORE_ID,
    LOADER_ID, MANDATORY_INTERNAL_IDS, PluginDiscovery,
};
pub use error::{ActivationError, DiscoveryError, LoaderError};
pub use host::{HostInfo, StaticHostInfo};
pub use manager::{LoadSummary, PluginManager};
pub use namespace::{HostNamespace, PluginNamespace};
pub use patch::{LoggingPatchApplier, PatchApplier};
pub use search_path::{CodeSearchPath, SharedSearchPath};
