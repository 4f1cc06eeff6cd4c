//! Typed TOML file loading and saving.
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Deserialize a TOML file into `T`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read TOML file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML file: {}", path.display()))
}

/// Deserialize a TOML file into `T`, or return `None` when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_optional_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    load_toml(path).map(Some)
}

/// Serialize `value` as a TOML document.
///
/// # Errors
///
/// Returns an error if `value` cannot be represented in TOML.
pub fn to_toml_string<T: Serialize>(value: &T) -> Result<String> {
    toml::to_string_pretty(value).context("Failed to serialize TOML")
}
