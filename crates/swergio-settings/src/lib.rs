//! # swergio-settings
//!
//! Layered configuration shared by the broker and every client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SwergioSettings::default()`]
//! 2. **Settings file**: `~/.swergio/settings.json` or `$SWERGIO_SETTINGS`
//! 3. **Environment variables**: `SWERGIO_*` overrides (highest priority)
//!
//! The `transport` section (header width, encoding, frame limit) is a
//! deployment-wide constant: peers do not negotiate it, so every process of a
//! deployment must load the same values.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton, initialized on first access.
static SETTINGS: OnceLock<SwergioSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads from [`settings_path`] with env var overrides. If
/// loading fails, the failure is logged and compiled defaults are used.
pub fn get_settings() -> &'static SwergioSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SwergioSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: SwergioSettings) -> std::result::Result<(), SwergioSettings> {
    SETTINGS.set(settings)
}
