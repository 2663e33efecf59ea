//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{GraftConfig, LoaderConfig, LoggingConfig};

const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validates the entire configuration.
///
/// Display inputs are not checked here; they are parsed defensively at
/// startup and never fail it.
pub fn validate_config(config: &GraftConfig) -> ConfigResult<()> {
    validate_loader_config(&config.loader)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates `loader.*`.
fn validate_loader_config(loader: &LoaderConfig) -> ConfigResult<()> {
    if loader.plugins_dir.as_os_str().is_empty() {
        return Err(ConfigError::validation("loader.plugins_dir must not be empty"));
    }

    // An absent mode may still be supplied programmatically.
    if let Some(mode) = &loader.mode {
        mode.parse::<graft_core::LoadingMode>()?;
    }

    Ok(())
}

/// Validates `logging.*`.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (module, level) in &logging.filters {
        if module.trim().is_empty() {
            return Err(ConfigError::validation("Log filter module name cannot be empty"));
        }
        if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(format!(
                "Invalid log level for '{module}': {level}. Valid values are: {VALID_LOG_LEVELS:?}"
            )));
        }
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation(
            "logging.max_files must be greater than 0",
        ));
    }

    Ok(())
}
