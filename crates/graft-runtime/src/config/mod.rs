//! Configuration for graft hosts.
//!
//! Layered with figment: built-in defaults, an optional profile file, the
//! main `graft.yaml`, `GRAFT_*` environment variables and finally
//! programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, PROFILE_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    DisplayConfig, GraftConfig, HostConfig, LoaderConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
