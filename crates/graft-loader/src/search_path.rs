//! The shared code search path.
//!
//! Activation appends every plugin package and namespace here, in load
//! order, so that later stages (patching in particular) can resolve symbols
//! from plugins that are already active. Nothing is ever removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft_core::EntryPointDescriptor;
use parking_lot::RwLock;
use tracing::debug;

use crate::namespace::PluginNamespace;

/// Receives packages and namespaces as plugins are activated.
pub trait CodeSearchPath: Send + Sync {
    /// Registers a package file. Adding the same path twice is a no-op.
    fn add_package(&self, path: &Path);

    /// Appends a freshly opened plugin namespace.
    fn append_namespace(&self, namespace: Arc<PluginNamespace>);
}

/// Default append-only [`CodeSearchPath`].
#[derive(Debug, Default)]
pub struct SharedSearchPath {
    packages: RwLock<Vec<PathBuf>>,
    namespaces: RwLock<Vec<Arc<PluginNamespace>>>,
}

impl SharedSearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered package files, in registration order.
    pub fn packages(&self) -> Vec<PathBuf> {
        self.packages.read().clone()
    }

    /// Appended namespaces, in activation order.
    pub fn namespaces(&self) -> Vec<Arc<PluginNamespace>> {
        self.namespaces.read().clone()
    }

    pub fn contains_package(&self, path: &Path) -> bool {
        self.packages.read().iter().any(|p| p == path)
    }

    /// Finds the first namespace whose local table defines `name`.
    pub fn resolve(&self, name: &str) -> Option<(Arc<PluginNamespace>, EntryPointDescriptor)> {
        self.namespaces.read().iter().find_map(|namespace| {
            namespace
                .resolve_local(name)
                .map(|descriptor| (Arc::clone(namespace), descriptor))
        })
    }
}

impl CodeSearchPath for SharedSearchPath {
    fn add_package(&self, path: &Path) {
        let mut packages = self.packages.write();
        if packages.iter().any(|p| p == path) {
            return;
        }
        debug!(path = %path.display(), "Package added to search path");
        packages.push(path.to_path_buf());
    }

    fn append_namespace(&self, namespace: Arc<PluginNamespace>) {
        debug!(plugin = %namespace.id(), "Namespace appended to search path");
        self.namespaces.write().push(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::HostNamespace;
    use graft_core::testing::write_plugin_package;
    use graft_core::{BoxError, EntryPoint, EntryPointRegistry, Metadata, Plugin};

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

    #[test]
    fn test_packages_are_deduplicated() {
        let search_path = SharedSearchPath::new();
        search_path.add_package(Path::new("plugins/a.zip"));
        search_path.add_package(Path::new("plugins/b.zip"));
        search_path.add_package(Path::new("plugins/a.zip"));

        assert_eq!(
            search_path.packages(),
            vec![PathBuf::from("plugins/a.zip"), PathBuf::from("plugins/b.zip")]
        );
        assert!(search_path.contains_package(Path::new("plugins/b.zip")));
    }

    #[test]
    fn test_resolve_across_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EntryPointRegistry::new();
        registry.register(graft_core::EntryPointDescriptor::owned::<Noop>("lib.Api", "lib"));
        let host = Arc::new(HostNamespace::new(Arc::new(registry)));

        let path = dir.path().join("lib.zip");
        write_plugin_package(&path, "id: lib\n");
        let metadata = Arc::new(Metadata::read_package(&path, "metadata.yml").unwrap().unwrap());
        let namespace = Arc::new(PluginNamespace::open(metadata, host).unwrap());

        let search_path = SharedSearchPath::new();
        assert!(search_path.resolve("lib.Api").is_none());

        search_path.append_namespace(namespace);
        let (owner, descriptor) = search_path.resolve("lib.Api").unwrap();
        assert_eq!(owner.id(), "lib");
        assert_eq!(descriptor.name(), "lib.Api");
    }
}
