//! Plugin discovery.
//!
//! [`PluginDiscovery::discover`] builds the candidate collection in three
//! steps, each tolerant of its own failures:
//!
//! 1. **Core package.** If the core package exists, its descriptor becomes
//!    the core record, and every bundled `internal-plugins/*.yml` descriptor
//!    becomes an internal record parented to it.
//! 2. **Fallback synthesis.** Mandatory internal modules that step 1 did not
//!    provide are synthesized as metadata-only records.
//! 3. **Directory scan.** Every package in the plugins directory with a
//!    readable descriptor is considered.
//!
//! Every candidate passes the environment filter and the id check: the first
//! record registered under an id wins, later ones are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use graft_core::{
    DESCRIPTOR_NAME, Environment, INTERNAL_PLUGINS_PREFIX, INTERNAL_PLUGINS_SUFFIX, LoadingMode,
    Metadata, PACKAGE_EXTENSION, PluginPackage,
};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::host::HostInfo;

/// Id of the core record, and the parent of every internal record.
pub const CORE_PLUGIN_ID: &str = "graft-core";

/// Id of the internal record describing the host application.
pub const HOST_CORE_ID: &str = "host-core";

/// Id of the internal record describing the loader itself.
pub const LOADER_ID: &str = "graft-loader";

/// Internal ids that must be present after discovery.
pub const MANDATORY_INTERNAL_IDS: [&str; 2] = [HOST_CORE_ID, LOADER_ID];

/// Default plugins directory.
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default location of the core package.
pub const DEFAULT_CORE_PACKAGE: &str = "graft-core.zip";

/// Where and how to look for plugins.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub plugins_dir: PathBuf,
    pub core_package: Option<PathBuf>,
    pub descriptor_name: String,
    pub internal_plugins_prefix: String,
    pub internal_plugins_suffix: String,
    pub package_extension: String,
    pub mode: LoadingMode,
}

impl DiscoveryOptions {
    /// Default layout for the given loading mode.
    pub fn new(mode: LoadingMode) -> Self {
        Self {
            plugins_dir: PathBuf::from(DEFAULT_PLUGINS_DIR),
            core_package: Some(PathBuf::from(DEFAULT_CORE_PACKAGE)),
            descriptor_name: DESCRIPTOR_NAME.to_string(),
            internal_plugins_prefix: INTERNAL_PLUGINS_PREFIX.to_string(),
            internal_plugins_suffix: INTERNAL_PLUGINS_SUFFIX.to_string(),
            package_extension: PACKAGE_EXTENSION.to_string(),
            mode,
        }
    }

    pub fn plugins_dir(mut self, plugins_dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = plugins_dir.into();
        self
    }

    pub fn core_package(mut self, core_package: Option<PathBuf>) -> Self {
        self.core_package = core_package;
        self
    }

    pub fn descriptor_name(mut self, descriptor_name: impl Into<String>) -> Self {
        self.descriptor_name = descriptor_name.into();
        self
    }

    pub fn package_extension(mut self, package_extension: impl Into<String>) -> Self {
        self.package_extension = package_extension.into();
        self
    }
}

/// The collection under construction. Insertion order is preserved.
#[derive(Default)]
struct Registered {
    records: Vec<Arc<Metadata>>,
    ids: HashSet<String>,
}

impl Registered {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, metadata: Metadata) {
        self.ids.insert(metadata.id().to_string());
        self.records.push(Arc::new(metadata));
    }
}

/// Finds plugin candidates on disk.
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    options: DiscoveryOptions,
}

impl PluginDiscovery {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub fn mode(&self) -> LoadingMode {
        self.options.mode
    }

    /// Runs all discovery steps and returns the admitted, de-duplicated
    /// records in registration order.
    ///
    /// Only an unusable plugins directory is fatal.
    pub fn discover(&self, host: &dyn HostInfo) -> Result<Vec<Arc<Metadata>>, DiscoveryError> {
        let mut registered = Registered::default();

        self.scan_core_package(&mut registered);
        self.synthesize_internals(&mut registered, host);
        self.scan_plugins_dir(&mut registered)?;

        info!(
            count = registered.records.len(),
            mode = %self.options.mode,
            "Plugin discovery finished"
        );
        Ok(registered.records)
    }

    /// Applies the environment and id checks shared by every step.
    fn admit(&self, registered: &Registered, metadata: &Metadata, source: &str) -> bool {
        if !metadata.admits(self.options.mode) {
            info!(
                plugin = %metadata.id(),
                environment = %metadata.environment(),
                mode = %self.options.mode,
                source,
                "Plugin does not support the current mode, skipping it"
            );
            return false;
        }
        if registered.contains(metadata.id()) {
            warn!(
                plugin = %metadata.id(),
                source,
                "Duplicate plugin id, keeping the first registration"
            );
            return false;
        }
        true
    }

    fn scan_core_package(&self, registered: &mut Registered) {
        let Some(core_path) = self.options.core_package.as_deref() else {
            return;
        };
        if !core_path.is_file() {
            debug!(path = %core_path.display(), "No core package found");
            return;
        }

        let core = match Metadata::read_package(core_path, &self.options.descriptor_name) {
            Ok(Some(core)) => core,
            Ok(None) => {
                warn!(
                    path = %core_path.display(),
                    descriptor = %self.options.descriptor_name,
                    "Core package has no descriptor, ignoring it"
                );
                return;
            }
            Err(e) => {
                warn!(path = %core_path.display(), error = %e, "Failed to read core package");
                return;
            }
        };

        let core_id = core.id().to_string();
        if self.admit(registered, &core, "core") {
            registered.insert(core);
        }

        let mut package = match PluginPackage::open(core_path) {
            Ok(package) => package,
            Err(e) => {
                warn!(path = %core_path.display(), error = %e, "Failed to scan core package");
                return;
            }
        };

        let entries = package.file_names_matching(
            &self.options.internal_plugins_prefix,
            &self.options.internal_plugins_suffix,
        );

        for entry in entries {
            let bytes = match package.read(&entry) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Failed to read bundled descriptor");
                    continue;
                }
            };

            let metadata = match Metadata::from_descriptor_bytes(&bytes, Some(core_path)) {
                Ok(Some(metadata)) => metadata,
                Ok(None) => {
                    debug!(entry = %entry, "Bundled descriptor has no id, skipping it");
                    continue;
                }
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Invalid bundled descriptor, skipping it");
                    continue;
                }
            };

            let metadata = metadata.to_builder().internal(true).parent(core_id.as_str()).build();
            let Ok(metadata) = metadata else {
                continue;
            };

            if self.admit(registered, &metadata, "bundled") {
                debug!(plugin = %metadata.id(), entry = %entry, "Registered bundled plugin");
                registered.insert(metadata);
            }
        }
    }

    fn synthesize_internals(&self, registered: &mut Registered, host: &dyn HostInfo) {
        for id in MANDATORY_INTERNAL_IDS {
            if registered.contains(id) {
                continue;
            }

            let builder = Metadata::builder()
                .id(id)
                .environment(Environment::Both)
                .internal(true)
                .parent(CORE_PLUGIN_ID);

            let builder = match id {
                HOST_CORE_ID => builder.name(host.name()).version(host.version()),
                _ => builder
                    .name("Graft Loader")
                    .version(env!("CARGO_PKG_VERSION"))
                    .license(env!("CARGO_PKG_LICENSE"))
                    .contacts(env!("CARGO_PKG_REPOSITORY")),
            };

            match builder.build() {
                Ok(metadata) if self.admit(registered, &metadata, "synthesized") => {
                    debug!(plugin = %id, "Synthesized internal plugin");
                    registered.insert(metadata);
                }
                _ => {}
            }
        }
    }

    fn scan_plugins_dir(&self, registered: &mut Registered) -> Result<(), DiscoveryError> {
        let dir = self.options.plugins_dir.as_path();
        self.ensure_plugins_dir(dir)?;

        let read_dir = std::fs::read_dir(dir).map_err(|source| DiscoveryError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = read_dir
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to read plugins directory entry");
                    None
                }
            })
            .filter(|path| path.is_file() && self.has_package_extension(path))
            .collect();
        candidates.sort();

        for path in candidates {
            let metadata = match Metadata::read_package(&path, &self.options.descriptor_name) {
                Ok(Some(metadata)) => metadata,
                Ok(None) => {
                    warn!(
                        path = %path.display(),
                        descriptor = %self.options.descriptor_name,
                        "Package has no plugin descriptor, skipping it"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid plugin package, skipping it");
                    continue;
                }
            };

            let Ok(metadata) = metadata.to_builder().config_root(dir).build() else {
                continue;
            };

            if !metadata.plugin_file().is_some_and(Path::exists) {
                warn!(
                    plugin = %metadata.id(),
                    path = %path.display(),
                    "Plugin file does not exist, skipping it"
                );
                continue;
            }

            if !self.admit(registered, &metadata, "directory") {
                continue;
            }

            if let Err(e) = metadata.ensure_config_folder() {
                warn!(
                    plugin = %metadata.id(),
                    folder = %metadata.config_folder().display(),
                    error = %e,
                    "Failed to create plugin config folder"
                );
            }

            debug!(plugin = %metadata.id(), path = %path.display(), "Registered plugin");
            registered.insert(metadata);
        }

        Ok(())
    }

    fn ensure_plugins_dir(&self, dir: &Path) -> Result<(), DiscoveryError> {
        if dir.exists() && !dir.is_dir() {
            return Err(DiscoveryError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        if dir.is_dir() {
            return Ok(());
        }

        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "Created plugins directory");
                Ok(())
            }
            Err(source) => {
                warn!(path = %dir.display(), error = %source, "Failed to create plugins directory");
                if dir.is_dir() {
                    Ok(())
                } else {
                    Err(DiscoveryError::CreateDir {
                        path: dir.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    fn has_package_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.options.package_extension))
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use graft_core::testing::{write_package, write_plugin_package};
    use parking_lot::Mutex;
    use tracing::field::Field;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::host::StaticHostInfo;

    fn options(dir: &Path, mode: LoadingMode) -> DiscoveryOptions {
        DiscoveryOptions::new(mode)
            .plugins_dir(dir.join("plugins"))
            .core_package(Some(dir.join("graft-core.zip")))
    }

    fn ids(records: &[Arc<Metadata>]) -> Vec<&str> {
        records.iter().map(|r| r.id()).collect()
    }

    fn host() -> StaticHostInfo {
        StaticHostInfo::new("Test Host", "41.0")
    }

    /// Collects the fields of every `WARN` event.
    #[derive(Clone, Default)]
    struct Warnings(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for Warnings {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() != Level::WARN {
                return;
            }
            let mut fields = String::new();
            event.record(&mut |field: &Field, value: &dyn fmt::Debug| {
                fields.push_str(&format!("{}={:?} ", field.name(), value));
            });
            self.0.lock().push(fields);
        }
    }

    #[test]
    fn test_empty_environment_synthesizes_internals() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));

        let records = discovery.discover(&host()).unwrap();
        assert_eq!(ids(&records), [HOST_CORE_ID, LOADER_ID]);

        for record in &records {
            assert!(record.is_internal());
            assert_eq!(record.parent(), Some(CORE_PLUGIN_ID));
            assert!(record.entry_points().is_empty());
            assert!(record.plugin_file().is_none());
        }
        assert_eq!(records[0].name(), Some("Test Host"));
        assert_eq!(records[0].version(), Some("41.0"));
        assert!(dir.path().join("plugins").is_dir());
    }

    #[test]
    fn test_core_package_bundles_internals() {
        let dir = tempfile::tempdir().unwrap();
        write_package(
            &dir.path().join("graft-core.zip"),
            &[
                ("metadata.yml", "id: graft-core\nname: Graft Core\n"),
                ("internal-plugins/host-core.yml", "id: host-core\nname: Bundled Host\n"),
                ("internal-plugins/client-ui.yml", "id: client-ui\nenvironment: client\n"),
                ("internal-plugins/broken.yml", "name: No Id\n"),
                ("internal-plugins/readme.txt", "id: not-a-descriptor\n"),
            ],
        );
        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));

        let records = discovery.discover(&host()).unwrap();
        assert_eq!(ids(&records), ["graft-core", "host-core", "graft-loader"]);

        let bundled = &records[1];
        assert_eq!(bundled.name(), Some("Bundled Host"));
        assert!(bundled.is_internal());
        assert_eq!(bundled.parent(), Some("graft-core"));
        assert_eq!(
            bundled.plugin_file(),
            Some(dir.path().join("graft-core.zip").as_path())
        );
    }

    #[test]
    fn test_core_package_without_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        write_package(
            &dir.path().join("graft-core.zip"),
            &[("internal-plugins/extra.yml", "id: extra\n")],
        );
        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Client));

        let records = discovery.discover(&host()).unwrap();
        assert_eq!(ids(&records), [HOST_CORE_ID, LOADER_ID]);
    }

    #[test]
    fn test_directory_scan_filters_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();

        write_plugin_package(&plugins.join("a-first.zip"), "id: dup\nname: First\n");
        write_plugin_package(&plugins.join("b-second.zip"), "id: dup\nname: Second\n");
        write_plugin_package(&plugins.join("client.zip"), "id: client-only\nenvironment: client\n");
        write_plugin_package(&plugins.join("server.zip"), "id: server-only\nenvironment: server\n");
        write_plugin_package(&plugins.join("no-id.zip"), "name: Anonymous\n");
        write_plugin_package(&plugins.join("bad-env.zip"), "id: bad-env\nenvironment: desktop\n");
        write_plugin_package(&plugins.join("wrong.jar"), "id: wrong-extension\n");
        std::fs::write(plugins.join("corrupt.zip"), b"not an archive").unwrap();

        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));
        let records = discovery.discover(&host()).unwrap();

        assert_eq!(
            ids(&records),
            [HOST_CORE_ID, LOADER_ID, "dup", "server-only"]
        );
        assert_eq!(records[2].name(), Some("First"));
        assert_eq!(records[2].config_root(), plugins.as_path());

        assert!(plugins.join("server-only").is_dir());
        assert!(plugins.join("dup").is_dir());
        assert!(!plugins.join("client-only").exists());
    }

    #[test]
    fn test_discovery_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(&plugins.join("foo.zip"), "id: foo\n");

        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Client));
        let first = discovery.discover(&host()).unwrap();
        let second = discovery.discover(&host()).unwrap();

        assert_eq!(ids(&first), ids(&second));
        let unique: HashSet<&str> = ids(&second).into_iter().collect();
        assert_eq!(unique.len(), second.len());
    }

    #[test]
    fn test_directory_plugin_cannot_replace_internal() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(&plugins.join("impostor.zip"), "id: host-core\n");

        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));
        let records = discovery.discover(&host()).unwrap();

        assert_eq!(ids(&records), [HOST_CORE_ID, LOADER_ID]);
        assert!(records[0].plugin_file().is_none());
    }

    #[test]
    fn test_id_outside_plugins_dir_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(&plugins.join("escape.zip"), "id: ../escaped\n");
        write_plugin_package(&plugins.join("absolute.zip"), "id: /tmp/graft-absolute\n");
        write_plugin_package(&plugins.join("fine.zip"), "id: fine\n");

        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));
        let records = discovery.discover(&host()).unwrap();

        assert_eq!(ids(&records), [HOST_CORE_ID, LOADER_ID, "fine"]);
        assert!(!dir.path().join("escaped").exists());
        assert!(plugins.join("fine").is_dir());
    }

    #[test]
    fn test_skipped_packages_are_warned_about() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_package(&plugins.join("no-descriptor.zip"), &[("readme.txt", "hello")]);
        std::fs::write(plugins.join("corrupt.zip"), b"not an archive").unwrap();

        let warnings = Warnings::default();
        let subscriber = tracing_subscriber::registry().with(warnings.clone());
        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));
        let records = tracing::subscriber::with_default(subscriber, || {
            discovery.discover(&host()).unwrap()
        });

        assert_eq!(ids(&records), [HOST_CORE_ID, LOADER_ID]);
        let warnings = warnings.0.lock();
        assert!(warnings.iter().any(|w| w.contains("no-descriptor.zip")));
        assert!(warnings.iter().any(|w| w.contains("corrupt.zip")));
    }

    #[test]
    fn test_plugins_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plugins"), b"oops").unwrap();

        let discovery = PluginDiscovery::new(options(dir.path(), LoadingMode::Server));
        assert!(matches!(
            discovery.discover(&host()),
            Err(DiscoveryError::NotADirectory { .. })
        ));
    }
}
