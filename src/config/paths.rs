//! Path management for the downloader
//!
//! ## Path Resolution Order
//!
//! 1. `COMPASS_DOWNLOADER_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/compass-downloader` or `~/.config/compass-downloader`
//! 3. Windows: `%APPDATA%\compass-downloader`

use std::path::PathBuf;

use crate::error::DownloadError;

const APP_DIR: &str = "compass-downloader";

/// Manages all paths used by the downloader
#[derive(Debug, Clone)]
pub struct DownloaderPaths {
    base_dir: PathBuf,
}

impl DownloaderPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home or config directory can be determined.
    pub fn new() -> Result<Self, DownloadError> {
        let base_dir = if let Ok(custom) = std::env::var("COMPASS_DOWNLOADER_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create paths rooted at a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), DownloadError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| DownloadError::Io(format!("Failed to create base directory: {}", e)))
    }

    /// Check if a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default configuration directory based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, DownloadError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    let base = directories::BaseDirs::new()
        .ok_or_else(|| DownloadError::Config("Could not determine home directory".into()))?;
    Ok(base.home_dir().join(".config").join(APP_DIR))
}

/// Resolve the default configuration directory based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, DownloadError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| DownloadError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join(APP_DIR))
}
