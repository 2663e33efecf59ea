//! Display settings handed to the host's display machinery.
//!
//! The raw `display.*` inputs are parsed defensively: a malformed value is
//! dropped with a warning and never prevents startup. Applying the result is
//! up to a [`DisplayBackend`] supplied by the host.

use std::fmt;

use graft_core::BoxError;
use tracing::{info, warn};

use crate::config::DisplayConfig;

/// How the host window is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Fullscreen,
    Windowed,
    Borderless,
}

impl WindowMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fullscreen" => Some(Self::Fullscreen),
            "windowed" => Some(Self::Windowed),
            "borderless" => Some(Self::Borderless),
            _ => None,
        }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fullscreen => "fullscreen",
            Self::Windowed => "windowed",
            Self::Borderless => "borderless",
        })
    }
}

/// Parsed display settings. `None` fields are left to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySettings {
    pub mode: Option<WindowMode>,
    /// Width and height, only set when both are valid.
    pub size: Option<(u32, u32)>,
}

impl DisplaySettings {
    /// Parses the raw inputs.
    ///
    /// `mode` wins over the legacy `fullscreen` flag, which counts as set for
    /// `true`, `1` or `yes` and as windowed for any other value.
    pub fn from_config(config: &DisplayConfig) -> Self {
        let mode = match (&config.mode, &config.fullscreen) {
            (Some(raw), _) => {
                let mode = WindowMode::parse(raw);
                if mode.is_none() {
                    warn!(value = %raw, "Ignoring invalid display.mode");
                }
                mode
            }
            (None, Some(flag)) => Some(if is_truthy(flag) {
                WindowMode::Fullscreen
            } else {
                WindowMode::Windowed
            }),
            (None, None) => None,
        };

        let width = parse_dimension("display.width", config.width.as_deref());
        let height = parse_dimension("display.height", config.height.as_deref());
        let size = match (width, height) {
            (Some(w), Some(h)) => Some((w, h)),
            (None, None) => None,
            _ => {
                warn!("display.width and display.height must both be set, ignoring size");
                None
            }
        };

        Self { mode, size }
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.size.is_none()
    }
}

fn is_truthy(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw == "1" || raw.eq_ignore_ascii_case("yes")
}

fn parse_dimension(key: &str, raw: Option<&str>) -> Option<u32> {
    let raw = raw?;
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid display dimension");
            None
        }
    }
}

/// Pass-through to the host's display machinery.
pub trait DisplayBackend: Send + Sync {
    fn apply(&self, settings: &DisplaySettings) -> Result<(), BoxError>;
}

/// A [`DisplayBackend`] that only logs the requested settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDisplayBackend;

impl DisplayBackend for LoggingDisplayBackend {
    fn apply(&self, settings: &DisplaySettings) -> Result<(), BoxError> {
        info!(
            mode = ?settings.mode.map(|m| m.to_string()),
            size = ?settings.size,
            "Display settings requested"
        );
        Ok(())
    }
}

/// Applies settings through `backend`, logging instead of failing.
pub fn apply_display_settings(backend: &dyn DisplayBackend, settings: &DisplaySettings) {
    if settings.is_empty() {
        return;
    }
    if let Err(e) = backend.apply(settings) {
        warn!(error = %e, "Failed to apply display settings");
    }
}
