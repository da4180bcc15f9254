// Daemon configuration.
//
// File: `~/.redline/config.toml`, with `REDLINE_*` environment variables
// taking precedence over the file. Missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::security::{ensure_owner_only_dir, ensure_owner_only_file};

/// Root directory for Redline global state: `~/.redline/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".redline"))
}

/// Path to the global config file: `~/.redline/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    pub documents: DocumentsConfig,
    pub safety: SafetyConfig,
    pub paging: PagingConfig,
    pub storage: StorageConfig,
}

/// Document root and backup behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Sandbox root all document paths resolve under. Defaults to the
    /// daemon's working directory.
    pub root: Option<PathBuf>,
    /// Write a `.bak` copy before each apply overwrites a document.
    pub autobackup: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self { root: None, autobackup: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetyConfig {
    /// Applies whose preview touches more than this fraction of the
    /// document's paragraphs are rejected unless explicitly overridden.
    pub blast_radius_threshold: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { blast_radius_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagingConfig {
    /// Maximum paragraphs returned per page by the paragraphs view.
    pub paragraph_limit: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self { paragraph_limit: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Base URL for the HTTP backend, e.g. `https://docs.internal/api`.
    pub http_base_url: Option<String>,
    /// Bearer token sent with HTTP backend requests.
    pub http_bearer_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackendKind::Local, http_base_url: None, http_bearer_token: None }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    Local,
    Http,
}

impl DaemonConfig {
    /// Load from `~/.redline/config.toml` and apply environment overrides.
    /// Returns defaults (plus overrides) if the file doesn't exist.
    pub fn load() -> Self {
        let mut config = global_config_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default();
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
            ensure_owner_only_dir(parent)
                .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io).and_then(|_| {
            ensure_owner_only_file(path)
                .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))
        })
    }

    /// Environment variables win over file values. `lookup` is injected so
    /// tests can run without mutating the process environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("REDLINE_ROOT") {
            self.documents.root = Some(PathBuf::from(root));
        }
        if let Some(value) = lookup("REDLINE_AUTOBACKUP") {
            self.documents.autobackup = parse_bool(&value).unwrap_or(self.documents.autobackup);
        }
        if let Some(value) = lookup("REDLINE_SAFETY_THRESHOLD") {
            if let Ok(threshold) = value.parse::<f64>() {
                if (0.0..=1.0).contains(&threshold) {
                    self.safety.blast_radius_threshold = threshold;
                }
            }
        }
        if let Some(value) = lookup("REDLINE_PAGING_LIMIT") {
            if let Ok(limit) = value.parse::<usize>() {
                if limit > 0 {
                    self.paging.paragraph_limit = limit;
                }
            }
        }
        if let Some(value) = lookup("REDLINE_STORAGE") {
            match value.as_str() {
                "local" => self.storage.backend = StorageBackendKind::Local,
                "http" => self.storage.backend = StorageBackendKind::Http,
                _ => {}
            }
        }
        if let Some(url) = lookup("REDLINE_HTTP_BASE_URL") {
            self.storage.http_base_url = Some(url);
        }
        if let Some(token) = lookup("REDLINE_HTTP_TOKEN") {
            self.storage.http_bearer_token = Some(token);
        }
    }

    /// Sandbox root, falling back to the process working directory.
    pub fn document_root(&self) -> std::io::Result<PathBuf> {
        match &self.documents.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
