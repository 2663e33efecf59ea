//! # Graft
//!
//! A plugin loader for host applications.
//!
//! ## Overview
//!
//! Plugins ship as zip packages carrying a `metadata.yml` descriptor. At
//! startup graft finds them, drops those that do not belong to the current
//! side (client or server), orders the rest so parents and dependencies come
//! first, and activates each one behind its own namespace.
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────────────────────┐
//! │ graft.yaml + │──▶│ Discovery │──▶│ Ordering │──▶│ Activation, per plugin:      │
//! │ GRAFT_* env  │   │ core pkg, │   │ parents, │   │ namespace, patches,          │
//! └──────────────┘   │ plugins/  │   │ deps     │   │ entry points, on_initialize  │
//!                    └───────────┘   └──────────┘   └──────────────────────────────┘
//! ```
//!
//! - **Core** (`graft-core`): metadata, descriptors, packages, ordering and
//!   the entry-point registry
//! - **Loader** (`graft-loader`): discovery, namespaces and the load pass
//! - **Runtime** (`graft-runtime`): configuration, logging and startup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graft::prelude::*;
//!
//! #[entry_point("greeter.Main", owner = "greeter")]
//! pub struct Greeter;
//!
//! impl Plugin for Greeter {
//!     fn on_initialize(&mut self) -> Result<(), BoxError> {
//!         info!("Hello!");
//!         Ok(())
//!     }
//! }
//!
//! impl EntryPoint for Greeter {
//!     fn construct(_metadata: Arc<Metadata>) -> Result<Self, BoxError> {
//!         Ok(Greeter)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let (_manager, summary) = GraftRuntime::builder().build()?.run()?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: also accept `graft.toml`
//! - `json-log`: JSON log output
//! - `testing`: helpers for writing plugin packages in tests

pub use graft_core as core;
pub use graft_loader as loader;
pub use graft_runtime as runtime;

pub use graft_macros::entry_point;

/// Commonly used types for hosts and plugins.
///
/// ```rust,ignore
/// use graft::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Startup
    pub use graft_runtime::{GraftConfig, GraftRuntime, RuntimeError};

    // Writing plugins
    pub use graft_core::{BoxError, EntryPoint, Environment, LoadingMode, Metadata, Plugin};
    pub use graft_macros::entry_point;

    // Driving the loader directly
    pub use graft_loader::{
        DiscoveryOptions, HostInfo, LoadSummary, PatchApplier, PluginManager, PluginNamespace,
    };

    pub use graft_runtime::prelude::*;
}
