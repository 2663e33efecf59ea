//! Per-plugin symbol namespaces.
//!
//! Every activated plugin gets its own [`PluginNamespace`]. A namespace sees
//! two tables:
//!
//! - the shared [`HostNamespace`]: entry points registered without an owner,
//!   plus any entry points explicitly re-exported to the host;
//! - its local table: the entry points owned by the plugin's id.
//!
//! Lookup is parent-first, host before local, so a plugin can never shadow a
//! host symbol. Entry points owned by *another* plugin are not visible and
//! resolve to [`ResolveError::NotVisible`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft_core::{
    EntryPointDescriptor, EntryPointRegistry, Metadata, PackageError, PluginPackage, ResolveError,
};
use parking_lot::RwLock;
use tracing::{debug, info};

// =============================================================================
// HostNamespace
// =============================================================================

/// The namespace shared by all plugins.
#[derive(Debug)]
pub struct HostNamespace {
    registry: Arc<EntryPointRegistry>,
    exports: RwLock<BTreeSet<String>>,
}

impl HostNamespace {
    pub fn new(registry: Arc<EntryPointRegistry>) -> Self {
        Self {
            registry,
            exports: RwLock::new(BTreeSet::new()),
        }
    }

    /// The registry all namespaces draw their symbols from.
    pub fn registry(&self) -> &Arc<EntryPointRegistry> {
        &self.registry
    }

    /// Makes a registered entry point visible to every plugin, regardless of
    /// its owner.
    pub fn re_export(&self, name: &str) -> Result<(), ResolveError> {
        let descriptor = self.registry.get(name).ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
        })?;
        if self.exports.write().insert(name.to_string()) {
            info!(
                entry_point = %name,
                owner = ?descriptor.owner(),
                "Entry point re-exported to the host namespace"
            );
        }
        Ok(())
    }

    /// Looks up a host-visible symbol.
    pub fn resolve(&self, name: &str) -> Option<EntryPointDescriptor> {
        let descriptor = self.registry.get(name)?;
        let visible = descriptor.owner().is_none() || self.exports.read().contains(name);
        visible.then_some(descriptor)
    }

    /// Names of all host-visible symbols.
    pub fn symbols(&self) -> Vec<String> {
        let exports = self.exports.read();
        self.registry
            .names()
            .into_iter()
            .filter(|name| {
                exports.contains(name)
                    || self
                        .registry
                        .get(name)
                        .is_some_and(|d| d.owner().is_none())
            })
            .collect()
    }
}

// =============================================================================
// PluginNamespace
// =============================================================================

/// The loading boundary of one plugin.
pub struct PluginNamespace {
    metadata: Arc<Metadata>,
    host: Arc<HostNamespace>,
    package_path: PathBuf,
    resources: Vec<String>,
    local: Vec<EntryPointDescriptor>,
}

impl PluginNamespace {
    /// Opens the plugin's package and binds the symbols it owns.
    ///
    /// Fails if the record has no backing file or the archive cannot be read.
    pub fn open(metadata: Arc<Metadata>, host: Arc<HostNamespace>) -> Result<Self, PackageError> {
        let package_path = match metadata.plugin_file() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(PackageError::Open {
                    path: PathBuf::new(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("plugin '{}' has no backing package", metadata.id()),
                    ),
                });
            }
        };

        let package = PluginPackage::open(&package_path)?;
        let resources = package.file_names();
        let local = host.registry().owned_by(metadata.id());

        debug!(
            plugin = %metadata.id(),
            path = %package_path.display(),
            resources = resources.len(),
            symbols = local.len(),
            "Plugin namespace opened"
        );

        Ok(Self {
            metadata,
            host,
            package_path,
            resources,
            local,
        })
    }

    pub fn id(&self) -> &str {
        self.metadata.id()
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    pub fn host(&self) -> &Arc<HostNamespace> {
        &self.host
    }

    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// Entry names of the package, sorted.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.binary_search_by(|r| r.as_str().cmp(name)).is_ok()
    }

    /// Reads a resource from the backing package.
    pub fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>, PackageError> {
        if !self.has_resource(name) {
            return Ok(None);
        }
        PluginPackage::open(&self.package_path)?.read(name)
    }

    /// Names of the symbols this plugin owns.
    pub fn local_symbols(&self) -> Vec<&str> {
        self.local.iter().map(|d| d.name()).collect()
    }

    /// Looks up a symbol in this plugin's local table only.
    pub fn resolve_local(&self, name: &str) -> Option<EntryPointDescriptor> {
        self.local.iter().find(|d| d.name() == name).cloned()
    }

    /// Resolves an entry-point name, host first, then local.
    pub fn resolve(&self, name: &str) -> Result<EntryPointDescriptor, ResolveError> {
        if let Some(descriptor) = self.host.resolve(name) {
            return Ok(descriptor);
        }
        if let Some(descriptor) = self.resolve_local(name) {
            return Ok(descriptor);
        }
        match self.host.registry().get(name) {
            Some(descriptor) => Err(ResolveError::NotVisible {
                name: name.to_string(),
                owner: descriptor.owner().unwrap_or_default().to_string(),
            }),
            None => Err(ResolveError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Publishes one of this plugin's symbols to the host namespace.
    pub fn re_export(&self, name: &str) -> Result<(), ResolveError> {
        if self.resolve_local(name).is_none() {
            return Err(ResolveError::NotFound {
                name: name.to_string(),
            });
        }
        self.host.re_export(name)
    }
}

impl fmt::Debug for PluginNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginNamespace")
            .field("id", &self.metadata.id())
            .field("package_path", &self.package_path)
            .field("resources", &self.resources.len())
            .field("local", &self.local_symbols())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::testing::write_package;
    use graft_core::{BoxError, EntryPoint, Plugin};

    struct Noop;

    impl Plugin for Noop {
        fn on_initialize(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    impl EntryPoint for Noop {
        fn construct(_metadata: Arc<Metadata>) -> Result<Self, BoxError> {
            Ok(Noop)
        }
    }

    fn host() -> Arc<HostNamespace> {
        let registry = EntryPointRegistry::new();
        registry.register(EntryPointDescriptor::new::<Noop>("host.Api"));
        registry.register(EntryPointDescriptor::owned::<Noop>("alpha.Main", "alpha"));
        registry.register(EntryPointDescriptor::owned::<Noop>("beta.Main", "beta"));
        Arc::new(HostNamespace::new(Arc::new(registry)))
    }

    fn namespace(dir: &Path, id: &str, host: &Arc<HostNamespace>) -> PluginNamespace {
        let path = dir.join(format!("{id}.zip"));
        let descriptor = format!("id: {id}\n");
        write_package(
            &path,
            &[
                ("metadata.yml", descriptor.as_str()),
                ("assets/lang.yml", "hello: world\n"),
            ],
        );
        let metadata = Metadata::read_package(&path, "metadata.yml").unwrap().unwrap();
        PluginNamespace::open(Arc::new(metadata), Arc::clone(host)).unwrap()
    }

    #[test]
    fn test_isolation_between_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let host = host();
        let alpha = namespace(dir.path(), "alpha", &host);
        let beta = namespace(dir.path(), "beta", &host);

        assert!(alpha.resolve("host.Api").is_ok());
        assert!(beta.resolve("host.Api").is_ok());
        assert_eq!(alpha.resolve("alpha.Main").unwrap().owner(), Some("alpha"));

        assert_eq!(
            beta.resolve("alpha.Main").unwrap_err(),
            ResolveError::NotVisible {
                name: "alpha.Main".to_string(),
                owner: "alpha".to_string(),
            }
        );
        assert_eq!(
            alpha.resolve("gamma.Main").unwrap_err(),
            ResolveError::NotFound {
                name: "gamma.Main".to_string()
            }
        );
    }

    #[test]
    fn test_re_export_makes_symbol_visible() {
        let dir = tempfile::tempdir().unwrap();
        let host = host();
        let alpha = namespace(dir.path(), "alpha", &host);
        let beta = namespace(dir.path(), "beta", &host);

        assert!(beta.resolve("alpha.Main").is_err());
        assert!(alpha.re_export("beta.Main").is_err());
        alpha.re_export("alpha.Main").unwrap();
        assert!(beta.resolve("alpha.Main").is_ok());
        assert!(host.symbols().contains(&"alpha.Main".to_string()));
    }

    #[test]
    fn test_resources_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let host = host();
        let alpha = namespace(dir.path(), "alpha", &host);

        assert!(alpha.has_resource("assets/lang.yml"));
        assert!(!alpha.has_resource("assets/missing.yml"));
        assert_eq!(
            alpha.read_resource("assets/lang.yml").unwrap().as_deref(),
            Some("hello: world\n".as_bytes())
        );
        assert_eq!(alpha.local_symbols(), vec!["alpha.Main"]);
    }

    #[test]
    fn test_open_requires_package() {
        let host = host();
        let fileless = Arc::new(Metadata::builder().id("ghost").build().unwrap());
        assert!(PluginNamespace::open(fileless, Arc::clone(&host)).is_err());

        let missing = Arc::new(
            Metadata::builder()
                .id("gone")
                .plugin_file("/nonexistent/gone.zip")
                .build()
                .unwrap(),
        );
        assert!(matches!(
            PluginNamespace::open(missing, host),
            Err(PackageError::Open { .. })
        ));
    }
}
