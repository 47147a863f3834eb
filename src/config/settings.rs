//! User settings for the downloader
//!
//! Backend conventions (download route, form prefix, language) and export
//! preferences. Every field has a default so partial files still load.

use serde::{Deserialize, Serialize};

use super::paths::DownloaderPaths;
use crate::error::DownloadError;

/// Text encoding used for exported tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// windows-1252 on Windows builds, UTF-8 elsewhere
    #[default]
    Auto,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "windows-1252")]
    Windows1252,
}

impl TextEncoding {
    /// Resolve `Auto` against the platform this binary was built for
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(windows) => Self::Windows1252,
            Self::Auto => Self::Utf8,
            other => other,
        }
    }

    /// Parse a user-supplied encoding label
    pub fn parse(label: &str) -> Result<Self, DownloadError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "windows-1252" | "cp1252" | "latin1" | "iso-8859-1" => Ok(Self::Windows1252),
            other => Err(DownloadError::Config(format!("Unknown encoding: {}", other))),
        }
    }
}

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Route of the paginated response ledger, relative to the backend URL
    #[serde(default = "default_download_route")]
    pub download_route: String,

    /// Prefix stripped from form ids when naming archive entries
    #[serde(default)]
    pub form_prefix: String,

    /// Language requested for form definitions
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Encoding of exported CSV files
    #[serde(default)]
    pub encoding: TextEncoding,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Top-level domain used to expand a bare backend name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_tld: Option<String>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_download_route() -> String {
    "download".to_string()
}

fn default_language_code() -> String {
    "de".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            download_route: default_download_route(),
            form_prefix: String::new(),
            language_code: default_language_code(),
            encoding: TextEncoding::default(),
            request_timeout_secs: default_request_timeout(),
            backend_tld: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if no file exists
    pub fn load_or_create(paths: &DownloaderPaths) -> Result<Self, DownloadError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                DownloadError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                DownloadError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &DownloaderPaths) -> Result<(), DownloadError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            DownloadError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| DownloadError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Expand a bare backend name into its API base URL
    ///
    /// Full URLs are returned unchanged (minus a trailing slash).
    pub fn backend_url(&self, backend: &str) -> Result<String, DownloadError> {
        let backend = backend.trim().trim_end_matches('/');
        if backend.starts_with("http://") || backend.starts_with("https://") {
            return Ok(backend.to_string());
        }
        match &self.backend_tld {
            Some(tld) => Ok(format!("https://{}.{}/api", backend, tld.trim_start_matches('.'))),
            None => Err(DownloadError::Config(format!(
                "'{}' is not a URL and no backend_tld is configured",
                backend
            ))),
        }
    }
}
