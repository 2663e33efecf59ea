//! Host identity collaborator.

/// Describes the host application the loader runs inside.
///
/// Used to synthesize the `host-core` record when the core package does not
/// bundle one.
pub trait HostInfo: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
}

/// [`HostInfo`] backed by fixed strings, usually taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHostInfo {
    name: String,
    version: String,
}

impl StaticHostInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for StaticHostInfo {
    fn default() -> Self {
        Self::new("Host", "unknown")
    }
}

impl HostInfo for StaticHostInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }
}
