//! Configuration loading and credential resolution
//!
//! Resolution priority, highest first:
//! 1. Command-line argument (clap also folds in the matching env var)
//! 2. TOML config file at the platform config path
//! 3. Compiled default (base URL only; the access token has none)

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default API endpoint of the streaming service
pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Keys readable from the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// OAuth access token for the streaming service
    pub access_token: Option<String>,
    /// Base URL of the streaming service API
    pub base_url: Option<String>,
}

/// Resolve the streaming-service access token.
///
/// `override_value` is the caller-supplied token (CLI flag or environment),
/// which wins over the config file. Fails when no source provides one; the
/// engine cannot reach the service anonymously.
pub fn resolve_access_token(override_value: Option<&str>) -> Result<String> {
    if let Some(token) = override_value {
        return Ok(token.to_string());
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            if let Some(token) = load_config_file(&path)?.access_token {
                return Ok(token);
            }
        }
    }

    Err(Error::Config(
        "no access token configured (flag, environment, or config file)".to_string(),
    ))
}

/// Resolve the service base URL, falling back to the compiled default.
pub fn resolve_base_url(override_value: Option<&str>) -> String {
    if let Some(url) = override_value {
        return url.to_string();
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            if let Ok(config) = load_config_file(&path) {
                if let Some(url) = config.base_url {
                    return url;
                }
            }
        }
    }

    DEFAULT_BASE_URL.to_string()
}

/// Parse a config file.
pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Platform config file location (`<config dir>/fairplay/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fairplay").join("config.toml"))
}
