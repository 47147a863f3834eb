use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use compass_downloader::cli::{
    handle_config_command, handle_download_command, handle_init_command, DownloadArgs,
};
use compass_downloader::config::{DownloaderPaths, Settings};

#[derive(Parser)]
#[command(
    name = "compass-download",
    author = "Kaylee Beyene",
    version,
    about = "Download and export encrypted survey responses",
    long_about = "Compass Downloader authenticates against a survey backend, \
                  retrieves the signed response ledger, decrypts every response \
                  and exports the answers as one CSV table per form, packed \
                  into a zip archive."
)]
struct Cli {
    /// Log every pipeline step
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download all responses and write the CSV archive
    Download(DownloadArgs),

    /// Write the default settings file
    Init,

    /// Show current configuration and paths
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Initialize paths and settings
    let paths = DownloaderPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Some(Commands::Download(args)) => {
            if let Err(e) = handle_download_command(&settings, args).await {
                eprintln!("{}", e.user_message());
                std::process::exit(1);
            }
        }
        Some(Commands::Init) => handle_init_command(&paths, &settings)?,
        Some(Commands::Config) => handle_config_command(&paths, &settings)?,
        None => {
            println!("Compass Downloader - encrypted survey response export");
            println!();
            println!("Run 'compass-download --help' for usage information.");
            println!("Run 'compass-download download --help' to see the download options.");
        }
    }

    Ok(())
}
