//! Configuration module
//!
//! - Platform path resolution
//! - Settings persistence (backend conventions, export encoding)

pub mod paths;
pub mod settings;

pub use paths::DownloaderPaths;
pub use settings::{Settings, TextEncoding};
