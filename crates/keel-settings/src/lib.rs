//! # keel-settings
//!
//! Configuration management with layered sources for the Keel runtime.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`RuntimeSettings::default()`]
//! 2. **File** — `~/.keel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `KEEL_*` overrides (highest priority)
//!
//! Per-session configuration lives in [`SessionOptions`], supplied
//! programmatically by the embedder.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{AgentDefaults, AgentProfile, RuntimeSettings, SessionOptions, StreamDefaults};

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<RuntimeSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.keel/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static RuntimeSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: RuntimeSettings) -> std::result::Result<(), RuntimeSettings> {
    SETTINGS.set(settings)
}
