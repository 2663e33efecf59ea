//! Plugin load pass and ownership of activated plugins.
//!
//! [`PluginManager`] drives a single load pass:
//!
//! - runs [`PluginDiscovery`] to collect admitted records;
//! - orders them with [`sort_metadata`] (parents and dependencies first);
//! - activates each record in that order, giving it its own
//!   [`PluginNamespace`], applying its patches and initialising its entry
//!   points.
//!
//! Any activation failure aborts the pass. Nothing is rolled back.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graft_core::{EntryPointRegistry, LoadingMode};
//! use graft_loader::{DiscoveryOptions, PluginManager};
//!
//! let registry = Arc::new(EntryPointRegistry::collect_all());
//! let mut manager = PluginManager::new(DiscoveryOptions::new(LoadingMode::Server), registry);
//! let summary = manager.initialize()?;
//! println!("{summary}");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use graft_core::{EntryPointRegistry, LoadingMode, Metadata, Plugin, sort_metadata};
use tracing::{debug, info, info_span};

use crate::discovery::{DiscoveryOptions, PluginDiscovery};
use crate::error::{ActivationError, LoaderError};
use crate::host::{HostInfo, StaticHostInfo};
use crate::namespace::{HostNamespace, PluginNamespace};
use crate::patch::{LoggingPatchApplier, PatchApplier};
use crate::search_path::{CodeSearchPath, SharedSearchPath};

// =============================================================================
// LoadSummary
// =============================================================================

/// The records activated by a load pass, in load order.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    plugins: Vec<Arc<Metadata>>,
}

impl LoadSummary {
    pub fn new(plugins: Vec<Arc<Metadata>>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &[Arc<Metadata>] {
        &self.plugins
    }

    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loaded plugins:")?;
        for plugin in &self.plugins {
            write!(f, "\n    - {plugin}")?;
        }
        Ok(())
    }
}

// =============================================================================
// PluginManager
// =============================================================================

/// An initialised entry point, kept alive for the life of the manager.
struct LoadedEntryPoint {
    plugin: String,
    name: String,
    _instance: Box<dyn Plugin>,
}

/// Owner of the load pass and of everything it produces.
///
/// The loading mode is fixed at construction and gates every admission
/// decision.
pub struct PluginManager {
    discovery: PluginDiscovery,
    host_info: Arc<dyn HostInfo>,
    host_namespace: Arc<HostNamespace>,
    search_path: Arc<dyn CodeSearchPath>,
    patch_applier: Arc<dyn PatchApplier>,
    plugins: Vec<Arc<Metadata>>,
    namespaces: HashMap<String, Arc<PluginNamespace>>,
    entry_points: Vec<LoadedEntryPoint>,
    initialized: bool,
}

impl PluginManager {
    /// Creates a manager with the default collaborators.
    pub fn new(options: DiscoveryOptions, registry: Arc<EntryPointRegistry>) -> Self {
        Self {
            discovery: PluginDiscovery::new(options),
            host_info: Arc::new(StaticHostInfo::default()),
            host_namespace: Arc::new(HostNamespace::new(registry)),
            search_path: Arc::new(SharedSearchPath::new()),
            patch_applier: Arc::new(LoggingPatchApplier::new()),
            plugins: Vec::new(),
            namespaces: HashMap::new(),
            entry_points: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_host_info(mut self, host_info: Arc<dyn HostInfo>) -> Self {
        self.host_info = host_info;
        self
    }

    pub fn with_search_path(mut self, search_path: Arc<dyn CodeSearchPath>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_patch_applier(mut self, patch_applier: Arc<dyn PatchApplier>) -> Self {
        self.patch_applier = patch_applier;
        self
    }

    pub fn mode(&self) -> LoadingMode {
        self.discovery.mode()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Activated records, in load order.
    pub fn plugins(&self) -> &[Arc<Metadata>] {
        &self.plugins
    }

    pub fn plugin(&self, id: &str) -> Option<&Arc<Metadata>> {
        self.plugins.iter().find(|p| p.id() == id)
    }

    pub fn namespace(&self, id: &str) -> Option<&Arc<PluginNamespace>> {
        self.namespaces.get(id)
    }

    pub fn search_path(&self) -> &Arc<dyn CodeSearchPath> {
        &self.search_path
    }

    pub fn host_namespace(&self) -> &Arc<HostNamespace> {
        &self.host_namespace
    }

    /// `(plugin id, entry point)` pairs of every initialised entry point.
    pub fn entry_points(&self) -> Vec<(&str, &str)> {
        self.entry_points
            .iter()
            .map(|e| (e.plugin.as_str(), e.name.as_str()))
            .collect()
    }

    /// Discovers and orders plugins without activating anything.
    pub fn plan(&self) -> Result<Vec<Arc<Metadata>>, LoaderError> {
        let discovered = self.discovery.discover(self.host_info.as_ref())?;
        Ok(sort_metadata(&discovered)?)
    }

    /// Runs the load pass. May only be called once.
    pub fn initialize(&mut self) -> Result<LoadSummary, LoaderError> {
        if self.initialized {
            return Err(LoaderError::AlreadyInitialized);
        }
        self.initialized = true;

        let span = info_span!("plugin_loading", mode = %self.mode());
        let _enter = span.enter();

        let ordered = self.plan()?;
        debug!(count = ordered.len(), "Resolved plugin load order");

        for metadata in ordered {
            if !metadata.admits(self.mode()) {
                debug!(plugin = %metadata.id(), "Plugin not admitted at activation, skipping it");
                continue;
            }
            let span = info_span!("plugin", id = %metadata.id());
            let _enter = span.enter();
            self.activate(&metadata)?;
            self.plugins.push(metadata);
        }

        let summary = LoadSummary::new(self.plugins.clone());
        info!("{summary}");
        Ok(summary)
    }

    fn activate(&mut self, metadata: &Arc<Metadata>) -> Result<(), ActivationError> {
        let id = metadata.id();
        let Some(plugin_file) = metadata.plugin_file() else {
            debug!(plugin = %id, "Metadata-only plugin, nothing to activate");
            return Ok(());
        };

        self.search_path.add_package(plugin_file);

        let namespace = PluginNamespace::open(Arc::clone(metadata), Arc::clone(&self.host_namespace))
            .map_err(|source| ActivationError::Package {
                plugin: id.to_string(),
                source,
            })?;
        let namespace = Arc::new(namespace);
        self.search_path.append_namespace(Arc::clone(&namespace));
        self.namespaces.insert(id.to_string(), Arc::clone(&namespace));

        self.patch_applier
            .apply_patches(metadata, &namespace)
            .map_err(|source| ActivationError::Patch {
                plugin: id.to_string(),
                source,
            })?;

        for name in metadata.entry_points() {
            let descriptor = namespace
                .resolve(name)
                .map_err(|source| ActivationError::Resolve {
                    plugin: id.to_string(),
                    source,
                })?;

            let mut instance = guarded(id, name, || descriptor.construct(Arc::clone(metadata)))?
                .map_err(|source| ActivationError::Construct {
                    plugin: id.to_string(),
                    entry_point: name.clone(),
                    source,
                })?;

            guarded(id, name, || instance.on_initialize())?.map_err(|source| {
                ActivationError::Initialize {
                    plugin: id.to_string(),
                    entry_point: name.clone(),
                    source,
                }
            })?;

            debug!(plugin = %id, entry_point = %name, "Entry point initialized");
            self.entry_points.push(LoadedEntryPoint {
                plugin: id.to_string(),
                name: name.clone(),
                _instance: instance,
            });
        }

        info!(plugin = %id, "Plugin activated");
        Ok(())
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("mode", &self.mode())
            .field("initialized", &self.initialized)
            .field("plugins", &self.plugins.len())
            .field("entry_points", &self.entry_points.len())
            .finish_non_exhaustive()
    }
}

/// Runs plugin code, turning a panic into [`ActivationError::Panic`].
fn guarded<T>(plugin: &str, entry_point: &str, f: impl FnOnce() -> T) -> Result<T, ActivationError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ActivationError::Panic {
        plugin: plugin.to_string(),
        entry_point: entry_point.to_string(),
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
