//! Configuration commands

use crate::config::{DownloaderPaths, Settings};
use crate::error::DownloadResult;

/// Show paths and effective settings
pub fn handle_config_command(paths: &DownloaderPaths, settings: &Settings) -> DownloadResult<()> {
    println!("Compass Downloader Configuration");
    println!("================================");
    println!("Config directory: {}", paths.base_dir().display());
    println!("Settings file:    {}", paths.settings_file().display());
    if !paths.is_initialized() {
        println!("                  (not written yet, run 'compass-download init')");
    }
    println!();
    println!("Settings:");
    println!("  Download route:   {}", settings.download_route);
    println!("  Form prefix:      {}", display_or_none(&settings.form_prefix));
    println!("  Language code:    {}", settings.language_code);
    println!(
        "  Encoding:         {:?} (resolves to {:?})",
        settings.encoding,
        settings.encoding.resolve()
    );
    println!("  Request timeout:  {}s", settings.request_timeout_secs);
    println!(
        "  Backend TLD:      {}",
        settings.backend_tld.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

/// Write the current settings to disk
pub fn handle_init_command(paths: &DownloaderPaths, settings: &Settings) -> DownloadResult<()> {
    println!("Initializing Compass Downloader at: {}", paths.base_dir().display());
    settings.save(paths)?;
    println!("Settings written to {}", paths.settings_file().display());
    Ok(())
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}
