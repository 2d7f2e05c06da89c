//! api-cli
//!
//! Command-line client for the accounts API:
//! 1. Loads configuration (file, then env overlay)
//! 2. Restores the session from the credential file, if configured
//! 3. Runs one subcommand through the authenticated client, printing JSON
//!
//! Expired access credentials are refreshed transparently; when refresh
//! fails the stored session is cleared and the command exits non-zero.

mod commands;
mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use session_auth::CredentialStore;
use session_client::{ApiClient, AuthSession};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::ReqwestTransport;

use crate::commands::{CliNavigator, Command};
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "api-cli", version, about = "Command-line client for the accounts API")]
struct Cli {
    /// Config file (default: $CONFIG_PATH or ./api-cli.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let config = if explicit {
        Config::load(&config_path)
    } else {
        Config::load_or_default(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        persistent = config.session.credentials_file.is_some(),
        "configuration loaded"
    );

    let transport = ReqwestTransport::new(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
    )
    .context("failed to build HTTP transport")?;

    let store = match &config.session.credentials_file {
        Some(path) => CredentialStore::load(path.clone())
            .await
            .with_context(|| format!("failed to load session from {}", path.display()))?,
        None => CredentialStore::in_memory(),
    };

    let client = ApiClient::new(
        Arc::new(transport),
        Arc::new(store),
        Arc::new(CliNavigator),
        config.client_config(),
    );
    let session = AuthSession::new(client);

    if let Some(output) = commands::run(cli.command, &session).await? {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to render output")?
        );
    }
    Ok(())
}
