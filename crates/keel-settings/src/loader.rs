//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RuntimeSettings::default()`]
//! 2. If `~/.keel/settings.json` exists, deep-merge file values over defaults
//! 3. Apply `KEEL_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::RuntimeSettings;

/// Resolve the path to the settings file (`~/.keel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".keel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RuntimeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RuntimeSettings> {
    let defaults = serde_json::to_value(RuntimeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, file)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RuntimeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are silently ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut RuntimeSettings) {
    if let Some(v) = read_env_u32("KEEL_MAX_TURNS", 1, 10_000) {
        settings.agent.max_turns = v;
    }
    if let Some(v) = read_env_u32("KEEL_MAX_STRUCTURED_OUTPUT_RETRIES", 1, 100) {
        settings.agent.max_structured_output_retries = v;
    }
    if let Some(v) = read_env_string("KEEL_DEFAULT_MODEL") {
        settings.agent.default_model = v;
    }
    if let Some(v) = read_env_usize("KEEL_EVENT_BUFFER", 1, 65_536) {
        settings.stream.event_buffer = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u32_range(&v, min, max))
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_usize_range(&v, min, max))
}
