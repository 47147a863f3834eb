//! Compass Downloader - secure retrieval and export of survey responses
//!
//! This library authenticates against a survey backend with hybrid-encrypted
//! credentials, pulls the signed paginated response ledger, decrypts each
//! record's CMS envelope, resolves the form definitions the records answer
//! and exports one CSV table per form into a zip archive.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Ledger records, response documents and form definitions
//! - `crypto`: Credential encryption, page signatures and envelope decryption
//! - `backend`: HTTP transport, token exchange, ledger paging and form lookup
//! - `services`: Answer reconciliation and the download pipeline
//! - `export`: Table pivoting, CSV encoding and zip packaging
//! - `display`: Terminal summary of a finished download
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use compass_downloader::backend::HttpTransport;
//! use compass_downloader::services::{DownloadRequest, DownloadService};
//!
//! let transport = HttpTransport::new(Duration::from_secs(30))?;
//! let report = DownloadService::new(&transport, &settings).run(&request).await?;
//! std::fs::write("responses.zip", &report.archive)?;
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod services;

#[cfg(test)]
mod testing;

pub use error::{DownloadError, DownloadResult};
