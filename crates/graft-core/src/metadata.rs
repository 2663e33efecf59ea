//! The plugin metadata record and its builder.
//!
//! A [`Metadata`] is immutable once built. Records are either parsed from a
//! descriptor embedded in a package ([`Metadata::from_package`]) or
//! synthesized through [`MetadataBuilder`]. Discovery derives variants of a
//! parsed record with [`Metadata::to_builder`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::descriptor::Descriptor;
use crate::environment::{Environment, LoadingMode};
use crate::error::{DescriptorError, MetadataError};
use crate::package::PluginPackage;

/// Config root used when a record has no backing file.
pub const DEFAULT_CONFIG_ROOT: &str = "plugins";

/// Version shown for records that do not declare one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Everything the loader knows about one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    id: String,
    name: Option<String>,
    description: Option<String>,
    author: Option<String>,
    version: Option<String>,
    license: Option<String>,
    contacts: Option<String>,
    image: Option<String>,
    image_url: Option<String>,
    environment: Environment,
    entry_points: Vec<String>,
    patches: Vec<String>,
    dependencies: BTreeMap<String, String>,
    internal: bool,
    parent: Option<String>,
    plugin_file: Option<PathBuf>,
    config_root: PathBuf,
}

impl Metadata {
    /// Starts an empty builder.
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::new()
    }

    /// Reads the descriptor at `descriptor` inside the package at `package_file`.
    ///
    /// Returns `None` when the package is unreadable, has no such entry, or
    /// holds a descriptor that does not describe a plugin. The reason is
    /// logged; use [`read_package`](Self::read_package) to get it instead.
    pub fn from_package(package_file: &Path, descriptor: &str) -> Option<Self> {
        match Self::read_package(package_file, descriptor) {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                debug!(
                    path = %package_file.display(),
                    descriptor,
                    "Package has no usable plugin descriptor"
                );
                None
            }
            Err(e) => {
                warn!(
                    path = %package_file.display(),
                    descriptor,
                    error = %e,
                    "Failed to read plugin descriptor"
                );
                None
            }
        }
    }

    /// Fallible form of [`from_package`](Self::from_package).
    ///
    /// `Ok(None)` means the package was readable but carries no descriptor,
    /// or its descriptor has no `id`.
    pub fn read_package(
        package_file: &Path,
        descriptor: &str,
    ) -> Result<Option<Self>, DescriptorError> {
        let mut package = PluginPackage::open(package_file)?;
        let Some(bytes) = package.read(descriptor)? else {
            return Ok(None);
        };
        Self::from_descriptor_bytes(&bytes, Some(package_file))
    }

    /// Parses descriptor bytes that were already read out of a package.
    pub fn from_descriptor_bytes(
        bytes: &[u8],
        package_file: Option<&Path>,
    ) -> Result<Option<Self>, DescriptorError> {
        let Some(mut builder) = Descriptor::parse(bytes)?.into_builder()? else {
            return Ok(None);
        };
        if let Some(path) = package_file {
            builder = builder.plugin_file(path);
        }
        Ok(Some(builder.build()?))
    }

    /// Returns a builder pre-filled with this record.
    pub fn to_builder(&self) -> MetadataBuilder {
        MetadataBuilder {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            version: self.version.clone(),
            license: self.license.clone(),
            contacts: self.contacts.clone(),
            image: self.image.clone(),
            image_url: self.image_url.clone(),
            environment: self.environment,
            entry_points: self.entry_points.clone(),
            patches: self.patches.clone(),
            dependencies: self.dependencies.clone(),
            internal: self.internal,
            parent: self.parent.clone(),
            plugin_file: self.plugin_file.clone(),
            config_root: Some(self.config_root.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn contacts(&self) -> Option<&str> {
        self.contacts.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Entry-point names in declared order.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Patch identifiers in declared order.
    pub fn patches(&self) -> &[String] {
        &self.patches
    }

    /// Dependency id to version constraint. Only used for ordering.
    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The package backing this record, if any. Several records may share one.
    pub fn plugin_file(&self) -> Option<&Path> {
        self.plugin_file.as_deref()
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Per-plugin configuration directory, `<config_root>/<id>`.
    pub fn config_folder(&self) -> PathBuf {
        self.config_root.join(&self.id)
    }

    /// Creates the configuration directory if it does not exist yet.
    pub fn ensure_config_folder(&self) -> std::io::Result<PathBuf> {
        let folder = self.config_folder();
        std::fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    /// Name for display purposes, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Version for display purposes, falling back to [`UNKNOWN_VERSION`].
    pub fn display_version(&self) -> &str {
        self.version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }

    /// Returns `true` if this plugin may load under `mode`.
    pub fn admits(&self, mode: LoadingMode) -> bool {
        self.environment.admits(mode)
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ID: {}, Version: {})",
            self.display_name(),
            self.id,
            self.display_version()
        )
    }
}

// =============================================================================
// MetadataBuilder
// =============================================================================

/// Builder for [`Metadata`].
///
/// Setters mirror the descriptor keys. Only `id` is required.
#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    pub(crate) id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) license: Option<String>,
    pub(crate) contacts: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) environment: Environment,
    pub(crate) entry_points: Vec<String>,
    pub(crate) patches: Vec<String>,
    pub(crate) dependencies: BTreeMap<String, String>,
    pub(crate) internal: bool,
    pub(crate) parent: Option<String>,
    pub(crate) plugin_file: Option<PathBuf>,
    pub(crate) config_root: Option<PathBuf>,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn contacts(mut self, contacts: impl Into<String>) -> Self {
        self.contacts = Some(contacts.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn entry_points<I, S>(mut self, entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_points = entry_points.into_iter().map(Into::into).collect();
        self
    }

    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_points.push(entry_point.into());
        self
    }

    pub fn patches<I, S>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patches = patches.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependencies(mut self, dependencies: BTreeMap<String, String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn dependency(mut self, id: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.dependencies.insert(id.into(), constraint.into());
        self
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn plugin_file(mut self, plugin_file: impl Into<PathBuf>) -> Self {
        self.plugin_file = Some(plugin_file.into());
        self
    }

    pub fn config_root(mut self, config_root: impl Into<PathBuf>) -> Self {
        self.config_root = Some(config_root.into());
        self
    }

    /// Builds the record.
    ///
    /// Fails when no (non-blank) id was set, or when the id is not a single
    /// path segment and so cannot name a directory under the config root.
    /// When no config root was
    /// given it defaults to the directory of the backing file, or
    /// [`DEFAULT_CONFIG_ROOT`] for file-less records.
    pub fn build(self) -> Result<Metadata, MetadataError> {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(MetadataError::MissingId)?;
        if !is_path_segment(&id) {
            return Err(MetadataError::InvalidId(id));
        }

        let config_root = self.config_root.unwrap_or_else(|| {
            match self.plugin_file.as_deref().and_then(Path::parent) {
                Some(dir) if dir.as_os_str().is_empty() => PathBuf::from("."),
                Some(dir) => dir.to_path_buf(),
                None => PathBuf::from(DEFAULT_CONFIG_ROOT),
            }
        });

        Ok(Metadata {
            id,
            name: self.name,
            description: self.description,
            author: self.author,
            version: self.version,
            license: self.license,
            contacts: self.contacts,
            image: self.image,
            image_url: self.image_url,
            environment: self.environment,
            entry_points: self.entry_points,
            patches: self.patches,
            dependencies: self.dependencies,
            internal: self.internal,
            parent: self.parent,
            plugin_file: self.plugin_file,
            config_root,
        })
    }
}

fn is_path_segment(id: &str) -> bool {
    let mut components = Path::new(id).components();
    !id.contains(['/', '\\'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
}
