//! Runtime error types.

use graft_loader::LoaderError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop host startup.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded, validated or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The plugin load pass failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
