//! # Graft Core
//!
//! The data model of the graft plugin loader.
//!
//! This crate has no notion of discovery or activation; it provides the
//! pieces those stages are built from:
//!
//! - **Metadata** ([`Metadata`], [`MetadataBuilder`]): one immutable record per
//!   plugin, parsed leniently from the `metadata.yml` descriptor inside a
//!   package ([`descriptor`], [`package`]).
//! - **Environment filter** ([`Environment`], [`LoadingMode`]): admits or
//!   rejects a plugin for the mode the host runs in.
//! - **Ordering** ([`sort_metadata`], [`resolve_layers`]): parent-before-child
//!   and dependency-before-dependent load order.
//! - **Entry points** ([`Plugin`], [`EntryPoint`], [`EntryPointRegistry`]):
//!   named factories collected at link time via [`ENTRY_POINTS`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graft_core::{Metadata, sort_metadata};
//!
//! let core = Arc::new(Metadata::builder().id("graft-core").build()?);
//! let addon = Arc::new(Metadata::builder().id("addon").parent("graft-core").build()?);
//!
//! let order = sort_metadata(&[addon, core])?;
//! assert_eq!(order[0].id(), "graft-core");
//! ```

pub mod descriptor;
pub mod entry_point;
pub mod environment;
pub mod error;
pub mod metadata;
pub mod order;
pub mod package;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Used by code generated from `#[entry_point]`.
pub use linkme;

pub use descriptor::Descriptor;
pub use entry_point::{
    ENTRY_POINTS, EntryPoint, EntryPointDescriptor, EntryPointFactory, EntryPointRegistry, Plugin,
};
pub use environment::{Environment, LoadingMode};
pub use error::{
    BoxError, DescriptorError, InvalidEnvironment, InvalidLoadingMode, MetadataError,
    OrderingError, PackageError, ResolveError,
};
pub use metadata::{Metadata, MetadataBuilder};
pub use order::{resolve_layers, sort_metadata};
pub use package::{
    DESCRIPTOR_NAME, INTERNAL_PLUGINS_PREFIX, INTERNAL_PLUGINS_SUFFIX, MAX_ENTRY_SIZE,
    PACKAGE_EXTENSION, PluginPackage,
};
