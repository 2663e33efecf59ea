//! Graft Runtime - startup orchestration for graft hosts.
//!
//! This crate provides:
//! - Layered configuration (`graft.yaml`, `GRAFT_*` environment variables,
//!   programmatic overrides)
//! - Logging setup on `tracing-subscriber`
//! - Display settings parsing and a backend seam for the host
//! - [`GraftRuntime`], which ties these together and runs the plugin load pass
//!
//! ```ignore
//! use graft_runtime::GraftRuntime;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = GraftRuntime::builder().build()?;
//!     let (_manager, summary) = runtime.run()?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, GraftConfig, LoaderConfig, LoggingConfig, Profile,
};
pub use display::{DisplayBackend, DisplaySettings, LoggingDisplayBackend, WindowMode};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{GraftRuntime, RuntimeBuilder};

// Re-export tracing for use by hosts and plugins
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
