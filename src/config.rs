//! Settings file handling.
use crate::error::{ChatError, Result};
use crate::history::MAX_HISTORY_MESSAGES;
use crate::store::default_data_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8787/v1/chat/completions";
pub const DEFAULT_MAX_TOKENS: u32 = 600;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

// --- Configuration Structures ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: EndpointParams,
    pub max_history_messages: usize,
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointParams::default(),
            max_history_messages: MAX_HISTORY_MESSAGES,
            data_dir: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointParams {
    pub url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: Option<u64>,
}

impl Default for EndpointParams {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT_URL.to_string(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Resolved data directory: explicit setting, then the platform default.
    pub fn data_dir(&self) -> Result<PathBuf> {
        self.data_dir
            .clone()
            .or_else(default_data_dir)
            .ok_or_else(|| ChatError::Config("could not determine a data directory".to_string()))
    }

    pub fn max_history_messages(&self) -> usize {
        self.max_history_messages.max(1)
    }
}

// --- Filesystem and Config Logic ---

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs_next::config_dir()
        .ok_or_else(|| ChatError::Config("could not determine a config directory".to_string()))?;
    Ok(config_dir
        .join("SkincareChat")
        .join("configuration")
        .join("settings.json"))
}

/// Reads the settings file. A missing file is created with defaults; an
/// unreadable one is left alone and defaults are used.
pub fn load_or_initialize_config(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid settings file, using defaults");
            AppConfig::default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let default_config = AppConfig::default();
            if let Err(e) = write_config(path, &default_config) {
                warn!(path = %path.display(), error = %e, "Failed to write default settings file");
            }
            default_config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read settings file, using defaults");
            AppConfig::default()
        }
    }
}

pub fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
