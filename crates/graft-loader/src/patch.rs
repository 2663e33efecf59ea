//! Patch application collaborator.
//!
//! How patches are applied to the host is outside the loader. It only hands
//! each plugin's declared patch list, together with the plugin's namespace,
//! to a [`PatchApplier`] before any of the plugin's entry points run.

use graft_core::{BoxError, Metadata};
use parking_lot::Mutex;
use tracing::info;

use crate::namespace::PluginNamespace;

/// Applies a plugin's declared patches.
///
/// Implementations apply `metadata.patches()` in declared order and decide
/// for themselves whether a single failing patch is fatal. Returning `Err`
/// aborts the load pass.
pub trait PatchApplier: Send + Sync {
    fn apply_patches(&self, metadata: &Metadata, namespace: &PluginNamespace)
    -> Result<(), BoxError>;
}

/// A [`PatchApplier`] that only records what it was asked to apply.
#[derive(Debug, Default)]
pub struct LoggingPatchApplier {
    applied: Mutex<Vec<(String, String)>>,
}

impl LoggingPatchApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(plugin id, patch)` pairs in the order they were seen.
    pub fn applied(&self) -> Vec<(String, String)> {
        self.applied.lock().clone()
    }
}

impl PatchApplier for LoggingPatchApplier {
    fn apply_patches(
        &self,
        metadata: &Metadata,
        namespace: &PluginNamespace,
    ) -> Result<(), BoxError> {
        let mut applied = self.applied.lock();
        for patch in metadata.patches() {
            info!(
                plugin = %metadata.id(),
                patch = %patch,
                package = %namespace.package_path().display(),
                "Applying patch"
            );
            applied.push((metadata.id().to_string(), patch.clone()));
        }
        Ok(())
    }
}
