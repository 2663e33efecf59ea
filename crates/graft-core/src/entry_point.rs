//! Plugin entry points and the registry that maps names to factories.
//!
//! # Overview
//!
//! A descriptor lists entry-point *names*. At activation each name is
//! resolved to an [`EntryPointDescriptor`], whose factory builds a
//! [`Plugin`] from the record's shared [`Metadata`]. The loader then calls
//! [`Plugin::on_initialize`] once.
//!
//! Descriptors come from two places:
//! - the [`ENTRY_POINTS`] distributed slice, filled at link time by
//!   `#[entry_point("name")]`;
//! - [`EntryPointRegistry::register`], for hosts that build them at runtime.
//!
//! An entry point with an `owner` is private to the plugin with that id.
//! Entry points without one belong to the host and are visible to every
//! plugin.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::BoxError;
use crate::metadata::Metadata;

/// A live plugin instance.
pub trait Plugin: Send {
    /// Runs the plugin's initialisation. Called exactly once, right after
    /// construction.
    fn on_initialize(&mut self) -> Result<(), BoxError>;
}

/// A type that can be constructed as a named entry point.
pub trait EntryPoint: Plugin + Sized + 'static {
    /// Builds the instance for the plugin described by `metadata`.
    fn construct(metadata: Arc<Metadata>) -> Result<Self, BoxError>;
}

/// Factory stored in an [`EntryPointDescriptor`].
pub type EntryPointFactory = fn(Arc<Metadata>) -> Result<Box<dyn Plugin>, BoxError>;

fn construct_boxed<T: EntryPoint>(metadata: Arc<Metadata>) -> Result<Box<dyn Plugin>, BoxError> {
    Ok(Box::new(T::construct(metadata)?))
}

/// A name bound to an entry-point factory.
#[derive(Clone)]
pub struct EntryPointDescriptor {
    name: Cow<'static, str>,
    owner: Option<Cow<'static, str>>,
    factory: EntryPointFactory,
}

impl EntryPointDescriptor {
    /// A host-level entry point for `T`.
    pub const fn new<T: EntryPoint>(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            owner: None,
            factory: construct_boxed::<T>,
        }
    }

    /// An entry point for `T` private to the plugin `owner`.
    pub const fn owned<T: EntryPoint>(name: &'static str, owner: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            owner: Some(Cow::Borrowed(owner)),
            factory: construct_boxed::<T>,
        }
    }

    /// Builds a descriptor from a raw factory.
    pub fn from_factory(
        name: impl Into<Cow<'static, str>>,
        owner: Option<String>,
        factory: EntryPointFactory,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.map(Cow::Owned),
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin id this entry point belongs to; `None` for host entry points.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Runs the factory.
    pub fn construct(&self, metadata: Arc<Metadata>) -> Result<Box<dyn Plugin>, BoxError> {
        (self.factory)(metadata)
    }
}

impl fmt::Debug for EntryPointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Link-time registry of entry points.
///
/// Populated by `#[entry_point]`; read through [`EntryPointRegistry::collect_all`].
#[distributed_slice]
pub static ENTRY_POINTS: [EntryPointDescriptor];

// =============================================================================
// EntryPointRegistry
// =============================================================================

/// Name-indexed set of entry-point descriptors.
///
/// Registration is append-only. When two descriptors share a name the first
/// one wins and the later one is dropped with a warning.
#[derive(Debug, Default)]
pub struct EntryPointRegistry {
    entries: RwLock<Vec<EntryPointDescriptor>>,
}

impl EntryPointRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with every entry point linked into the binary.
    pub fn collect_all() -> Self {
        let registry = Self::new();
        for descriptor in ENTRY_POINTS.iter() {
            registry.register(descriptor.clone());
        }
        debug!(count = registry.len(), "Collected linked entry points");
        registry
    }

    /// Adds a descriptor. Returns `false` if the name was already taken.
    pub fn register(&self, descriptor: EntryPointDescriptor) -> bool {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter().find(|e| e.name() == descriptor.name()) {
            warn!(
                entry_point = %descriptor.name(),
                kept_owner = ?existing.owner(),
                dropped_owner = ?descriptor.owner(),
                "Duplicate entry point name, keeping the first registration"
            );
            return false;
        }
        entries.push(descriptor);
        true
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<EntryPointDescriptor> {
        self.entries.read().iter().find(|e| e.name() == name).cloned()
    }

    /// Descriptors without an owner, in registration order.
    pub fn unowned(&self) -> Vec<EntryPointDescriptor> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.owner().is_none())
            .cloned()
            .collect()
    }

    /// Descriptors owned by the plugin `id`, in registration order.
    pub fn owned_by(&self, id: &str) -> Vec<EntryPointDescriptor> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.owner() == Some(id))
            .cloned()
            .collect()
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
