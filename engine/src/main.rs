// Secure updates client
// Main entry point for the secure-updates binary

use anyhow::Context;
use clap::Parser;
use secure_updates_engine::cli::{Cli, Command};
use secure_updates_engine::config::Config;
use secure_updates_engine::handlers::{
    handle_config, handle_info, handle_lifecycle, handle_logs, handle_rewrite, handle_status,
    handle_sync, handle_test_connection, handle_verify, OutputFormat,
};
use secure_updates_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = if cli.config.is_some() {
        Config::load_from_path(&config_path)
    } else {
        Config::load_or_create()
    };

    // The subscriber is installed once: --log, then config, then "info"
    match (&cli.log, &config) {
        (Some(level), _) => init_telemetry_with_level(level),
        (None, Ok(config)) => init_telemetry_with_level(&config.core.log_level),
        (None, Err(_)) => init_telemetry(),
    }

    let config = config
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");
    tracing::debug!("secure-updates v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Status { site_version } => handle_status(&config, site_version, format).await,

        Command::TestConnection { url } => {
            tracing::info!("Testing connection...");
            handle_test_connection(url, &config, format).await
        }

        Command::Sync { slugs } => {
            tracing::info!("Syncing plugin inventory");
            handle_sync(slugs, &config, format).await
        }

        Command::Lifecycle { event } => {
            tracing::debug!("Lifecycle event: {:?}", event);
            handle_lifecycle(event, &config, format).await
        }

        Command::Rewrite { pending } => handle_rewrite(&pending, &config, format).await,

        Command::Verify { file, checksum } => {
            handle_verify(&file, &checksum, &config, format).await
        }

        Command::Info { slug, package } => handle_info(&slug, package, &config, format).await,

        Command::Logs { limit } => handle_logs(limit, &config, format).await,

        Command::Config { action } => {
            tracing::debug!("Config management: {:?}", action);
            handle_config(action, &config, &config_path, format).await
        }
    }
}
