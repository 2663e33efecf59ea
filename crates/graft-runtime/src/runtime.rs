//! Host startup: configuration, logging, display and the plugin load pass.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use graft_runtime::GraftRuntime;
//!
//! // graft.yaml from the current directory or <config_dir>/graft,
//! // GRAFT_* overrides on top
//! let runtime = GraftRuntime::builder().build()?;
//! let (manager, summary) = runtime.run()?;
//!
//! // Explicit file and mode
//! let runtime = GraftRuntime::builder()
//!     .config_file("config/graft.yaml")
//!     .mode(LoadingMode::Server)
//!     .build()?;
//! ```

use std::path::Path;
use std::sync::Arc;

use graft_core::{EntryPointRegistry, LoadingMode, Metadata};
use graft_loader::{
    CodeSearchPath, HostInfo, LoadSummary, LoggingPatchApplier, PatchApplier, PluginManager,
    StaticHostInfo,
};
use tracing::info;

use crate::config::{ConfigLoader, GraftConfig, validate_config};
use crate::display::{
    DisplayBackend, DisplaySettings, LoggingDisplayBackend, apply_display_settings,
};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured host, ready to run its plugin load pass.
pub struct GraftRuntime {
    config: GraftConfig,
    mode: LoadingMode,
    registry: Arc<EntryPointRegistry>,
    host_info: Arc<dyn HostInfo>,
    patch_applier: Arc<dyn PatchApplier>,
    search_path: Option<Arc<dyn CodeSearchPath>>,
    display_backend: Arc<dyn DisplayBackend>,
    init_logging: bool,
}

impl GraftRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config` and resolves its loading mode.
    ///
    /// Entry points come from the link-time registry and host identity
    /// from `host.*`.
    pub fn from_config(config: GraftConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        let mode = config.loader.loading_mode()?;
        let host_info = Arc::new(StaticHostInfo::new(
            config.host.name.clone(),
            config.host.version.clone(),
        ));

        Ok(Self {
            config,
            mode,
            registry: Arc::new(EntryPointRegistry::collect_all()),
            host_info,
            patch_applier: Arc::new(LoggingPatchApplier::new()),
            search_path: None,
            display_backend: Arc::new(LoggingDisplayBackend),
            init_logging: true,
        })
    }

    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    pub fn mode(&self) -> LoadingMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<EntryPointRegistry> {
        &self.registry
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings::from_config(&self.config.display)
    }

    /// Discovers and orders plugins without activating any of them.
    pub fn plan(&self) -> RuntimeResult<Vec<Arc<Metadata>>> {
        Ok(self.manager().plan()?)
    }

    /// Runs startup and returns the manager that owns the live plugins.
    pub fn run(self) -> RuntimeResult<(PluginManager, LoadSummary)> {
        if self.init_logging {
            logging::init_from_config(&self.config.logging);
        }

        info!(
            host = %self.host_info.name(),
            version = %self.host_info.version(),
            mode = %self.mode,
            plugins_dir = %self.config.loader.plugins_dir.display(),
            "Starting graft"
        );

        apply_display_settings(self.display_backend.as_ref(), &self.display_settings());

        let mut manager = self.manager();
        let summary = manager.initialize()?;
        Ok((manager, summary))
    }

    fn manager(&self) -> PluginManager {
        let options = self.config.loader.discovery_options(self.mode);
        let mut manager = PluginManager::new(options, Arc::clone(&self.registry))
            .with_host_info(Arc::clone(&self.host_info))
            .with_patch_applier(Arc::clone(&self.patch_applier));
        if let Some(search_path) = &self.search_path {
            manager = manager.with_search_path(Arc::clone(search_path));
        }
        manager
    }
}

impl std::fmt::Debug for GraftRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraftRuntime")
            .field("mode", &self.mode)
            .field("host", &self.host_info.name())
            .field("registry", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`GraftRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    registry: Option<Arc<EntryPointRegistry>>,
    host_info: Option<Arc<dyn HostInfo>>,
    patch_applier: Option<Arc<dyn PatchApplier>>,
    search_path: Option<Arc<dyn CodeSearchPath>>,
    display_backend: Option<Arc<dyn DisplayBackend>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
            registry: None,
            host_info: None,
            patch_applier: None,
            search_path: None,
            display_backend: None,
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a whole configuration over the loaded sources.
    pub fn merge(mut self, config: GraftConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides a single dotted key.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Overrides `loader.mode`.
    pub fn mode(self, mode: LoadingMode) -> Self {
        self.set("loader.mode", mode.as_str())
    }

    pub fn plugins_dir<P: AsRef<Path>>(self, path: P) -> Self {
        self.set("loader.plugins_dir", path.as_ref().to_path_buf())
    }

    pub fn core_package<P: AsRef<Path>>(self, path: P) -> Self {
        self.set("loader.core_package", path.as_ref().to_path_buf())
    }

    /// Replaces the link-time entry-point registry.
    pub fn registry(mut self, registry: Arc<EntryPointRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the identity taken from `host.*`.
    pub fn host_info(mut self, host_info: Arc<dyn HostInfo>) -> Self {
        self.host_info = Some(host_info);
        self
    }

    pub fn patch_applier(mut self, patch_applier: Arc<dyn PatchApplier>) -> Self {
        self.patch_applier = Some(patch_applier);
        self
    }

    pub fn code_search_path(mut self, search_path: Arc<dyn CodeSearchPath>) -> Self {
        self.search_path = Some(search_path);
        self
    }

    pub fn display_backend(mut self, backend: Arc<dyn DisplayBackend>) -> Self {
        self.display_backend = Some(backend);
        self
    }

    /// Whether [`GraftRuntime::run`] installs the global subscriber.
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn build(self) -> RuntimeResult<GraftRuntime> {
        let config = self.config_loader.load()?;
        let mut runtime = GraftRuntime::from_config(config)?;

        if let Some(registry) = self.registry {
            runtime.registry = registry;
        }
        if let Some(host_info) = self.host_info {
            runtime.host_info = host_info;
        }
        if let Some(patch_applier) = self.patch_applier {
            runtime.patch_applier = patch_applier;
        }
        if let Some(backend) = self.display_backend {
            runtime.display_backend = backend;
        }
        runtime.search_path = self.search_path;
        runtime.init_logging = self.init_logging;

        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use graft_core::testing::write_plugin_package;
    use graft_core::{BoxError, EntryPoint, EntryPointDescriptor, Plugin};
    use graft_loader::{HOST_CORE_ID, LOADER_ID, LoaderError};
    use parking_lot::Mutex;
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::config::ConfigError;
    use crate::display::WindowMode;
    use crate::error::RuntimeError;

    struct Greeter;

    impl Plugin for Greeter {
        fn on_initialize(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    impl EntryPoint for Greeter {
        fn construct(_metadata: Arc<Metadata>) -> Result<Self, BoxError> {
            Ok(Greeter)
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        applied: Mutex<Vec<DisplaySettings>>,
    }

    impl DisplayBackend for RecordingBackend {
        fn apply(&self, settings: &DisplaySettings) -> Result<(), BoxError> {
            self.applied.lock().push(*settings);
            Ok(())
        }
    }

    fn registry() -> Arc<EntryPointRegistry> {
        let registry = EntryPointRegistry::new();
        registry.register(EntryPointDescriptor::owned::<Greeter>("greeter.Main", "greeter"));
        Arc::new(registry)
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("graft.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn builder(config: &Path) -> RuntimeBuilder {
        RuntimeBuilder::new()
            .config_file(config)
            .without_env()
            .registry(registry())
            .init_logging(false)
    }

    /// Records the name of every span opened.
    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            self.0.lock().push(attrs.metadata().name().to_string());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_config_found_in_user_config_dir() {
        figment::Jail::expect_with(|jail| {
            let user_dir = jail.directory().join("xdg").join("graft");
            std::fs::create_dir_all(&user_dir).map_err(|e| e.to_string())?;
            std::fs::write(
                user_dir.join("graft.yaml"),
                "loader:\n  mode: server\nhost:\n  name: User Host\n",
            )
            .map_err(|e| e.to_string())?;
            jail.set_env("XDG_CONFIG_HOME", jail.directory().join("xdg").display());

            let runtime = RuntimeBuilder::new()
                .without_env()
                .registry(registry())
                .init_logging(false)
                .build()
                .map_err(|e| e.to_string())?;

            assert_eq!(runtime.mode(), LoadingMode::Server);
            assert_eq!(runtime.config().host.name, "User Host");
            Ok(())
        });
    }

    #[test]
    fn test_activations_run_in_plugin_spans() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "loader:\n  mode: client\n");
        let runtime = builder(&config)
            .plugins_dir(dir.path().join("plugins"))
            .core_package(dir.path().join("none.zip"))
            .build()
            .unwrap();

        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        let (_manager, summary) =
            tracing::subscriber::with_default(subscriber, || runtime.run().unwrap());

        let names = names.0.lock();
        assert!(names.iter().any(|n| n == "plugin_loading"));
        assert_eq!(
            names.iter().filter(|n| *n == "plugin").count(),
            summary.ids().len()
        );
    }

    #[test]
    fn test_missing_mode_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "host:\n  name: Test\n");

        let err = builder(&config).build().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_mode_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "loader:\n  mode: client\n");

        let runtime = builder(&config).mode(LoadingMode::Server).build().unwrap();
        assert_eq!(runtime.mode(), LoadingMode::Server);
    }

    #[test]
    fn test_run_activates_plugins_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("mods");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(
            &plugins.join("greeter.zip"),
            "id: greeter\nversion: 2.0\nentrypoints: greeter.Main\n",
        );

        let config = write_config(
            dir.path(),
            &format!(
                "loader:\n  mode: server\n  plugins_dir: {}\n  core_package: {}\nhost:\n  name: Test Host\n  version: 3\n",
                plugins.display(),
                dir.path().join("missing-core.zip").display()
            ),
        );

        let runtime = builder(&config).build().unwrap();
        assert_eq!(runtime.config().host.version, "3");

        let (manager, summary) = runtime.run().unwrap();
        let ids = summary.ids();
        assert!(ids.contains(&HOST_CORE_ID));
        assert!(ids.contains(&LOADER_ID));
        assert!(ids.contains(&"greeter"));
        assert_eq!(manager.entry_points(), vec![("greeter", "greeter.Main")]);
        assert_eq!(
            manager.plugin(HOST_CORE_ID).map(|m| m.display_version().to_string()),
            Some("3".to_string())
        );
    }

    #[test]
    fn test_loader_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(
            &plugins.join("broken.zip"),
            "id: broken\nentrypoints: nowhere.Main\n",
        );
        let config = write_config(dir.path(), "loader:\n  mode: client\n");

        let err = builder(&config)
            .plugins_dir(&plugins)
            .core_package(dir.path().join("none.zip"))
            .build()
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Loader(LoaderError::Activation(_))));
    }

    #[test]
    fn test_plan_lists_without_activating() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        write_plugin_package(
            &plugins.join("greeter.zip"),
            "id: greeter\nentrypoints: greeter.Main\n",
        );
        let config = write_config(dir.path(), "loader:\n  mode: client\n");

        let runtime = builder(&config)
            .plugins_dir(&plugins)
            .core_package(dir.path().join("none.zip"))
            .build()
            .unwrap();
        let ids: Vec<String> = runtime
            .plan()
            .unwrap()
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        assert!(ids.contains(&"greeter".to_string()));
    }

    #[test]
    fn test_display_settings_reach_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "loader:\n  mode: client\ndisplay:\n  mode: borderless\n  width: 1280\n  height: nope\n",
        );
        let backend = Arc::new(RecordingBackend::default());

        let runtime = builder(&config)
            .plugins_dir(dir.path().join("plugins"))
            .core_package(dir.path().join("none.zip"))
            .display_backend(backend.clone())
            .build()
            .unwrap();
        runtime.run().unwrap();

        let applied = backend.applied.lock();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].mode, Some(WindowMode::Borderless));
        assert_eq!(applied[0].size, None);
    }
}
