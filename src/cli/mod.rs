//! CLI command handlers
//!
//! Bridges the clap argument parsing with the service layer.

pub mod config;
pub mod download;

pub use config::{handle_config_command, handle_init_command};
pub use download::{handle_download_command, DownloadArgs};
