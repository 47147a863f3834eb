//! Download command
//!
//! Collects the operator inputs (backend, key files, credentials), runs the
//! pipeline and writes the archive.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tracing::info;

use crate::backend::HttpTransport;
use crate::config::{Settings, TextEncoding};
use crate::crypto::SecretString;
use crate::display::format_report;
use crate::error::{DownloadError, DownloadResult};
use crate::services::{DownloadRequest, DownloadService};

/// Arguments of `compass-download download`
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Backend API base URL
    #[arg(long, required_unless_present = "backend", conflicts_with = "backend")]
    pub url: Option<String>,

    /// Backend name, expanded with the configured backend_tld
    #[arg(long)]
    pub backend: Option<String>,

    /// Backend public key (PEM)
    #[arg(long, value_name = "FILE")]
    pub public_key: PathBuf,

    /// Private key for the response envelopes (PEM)
    #[arg(long, value_name = "FILE")]
    pub private_key: PathBuf,

    /// API user name
    #[arg(short, long)]
    pub username: String,

    /// API password (prompted for when omitted)
    #[arg(long, env = "COMPASS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Where to write the zip archive
    #[arg(short, long, value_name = "FILE", default_value = "responses.zip")]
    pub output: PathBuf,

    /// Text encoding of the CSV files (auto, utf-8, windows-1252)
    #[arg(long)]
    pub encoding: Option<String>,

    /// Also write the reconciled form trees as JSON
    #[arg(long, value_name = "FILE")]
    pub reconciled: Option<PathBuf>,
}

/// Handle the download command
pub async fn handle_download_command(settings: &Settings, args: DownloadArgs) -> DownloadResult<()> {
    let mut settings = settings.clone();
    if let Some(label) = &args.encoding {
        settings.encoding = TextEncoding::parse(label)?;
    }

    let base_url = match (&args.url, &args.backend) {
        (Some(url), _) => settings.backend_url(url)?,
        (None, Some(name)) => settings.backend_url(name)?,
        (None, None) => {
            return Err(DownloadError::Config(
                "Either --url or --backend is required".into(),
            ))
        }
    };

    let password = match args.password {
        Some(password) => SecretString::from(password),
        None => prompt_password(&format!("Password for {}: ", args.username))?,
    };

    let request = DownloadRequest {
        base_url,
        username: args.username,
        password,
        public_key_pem: read_key(&args.public_key)?,
        private_key_pem: read_key(&args.private_key)?,
    };

    let transport = HttpTransport::new(Duration::from_secs(settings.request_timeout_secs))?;
    let report = DownloadService::new(&transport, &settings)
        .run(&request)
        .await?;

    fs::write(&args.output, &report.archive)
        .map_err(|e| DownloadError::Io(format!("Failed to write {}: {}", args.output.display(), e)))?;
    info!(path = %args.output.display(), bytes = report.archive.len(), "Archive written");

    if let Some(path) = &args.reconciled {
        let json = serde_json::to_string_pretty(&report.reconciled)?;
        fs::write(path, json)
            .map_err(|e| DownloadError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
    }

    print!("{}", format_report(&report));
    println!("Archive written to {}", args.output.display());
    Ok(())
}

fn read_key(path: &Path) -> DownloadResult<String> {
    fs::read_to_string(path)
        .map_err(|e| DownloadError::Io(format!("Failed to read key file {}: {}", path.display(), e)))
}

/// Prompt for a password (hidden input)
fn prompt_password(prompt: &str) -> DownloadResult<SecretString> {
    rpassword::prompt_password(prompt)
        .map(SecretString::from)
        .map_err(|e| DownloadError::Io(format!("Failed to read password: {}", e)))
}
