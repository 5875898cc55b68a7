//! apptrack - track job and scholarship applications from the terminal.
//!
//! Talks to the tracker REST API through `apptrack-core`. The refresh token
//! lives in the OS keychain, so a session survives between invocations and
//! an expired access token is renewed transparently.

mod commands;
mod format;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use apptrack_core::auth::{KeyringStore, LoginRedirect};
use apptrack_core::{ApiClient, ApiError, Config, Tracker};

use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "apptrack", version, about = "Track job and scholarship applications")]
struct Cli {
    /// API server, e.g. https://tracker.example.com (`/api/v1` is appended)
    #[arg(long, global = true, env = "APPTRACK_API_URL")]
    api_url: Option<String>,

    /// Write logs to a daily rotated file in this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=apptrack_core=debug).
/// The returned guard must stay alive for file logs to be flushed.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "apptrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_ref());

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url.clone() {
        config.api_url = Some(url);
    }
    info!(api = %config.api_base_url(), "apptrack starting");

    let login_redirect = LoginRedirect::new();
    let client = ApiClient::from_config(&config)
        .token_store(Arc::new(KeyringStore::new(config.token_slot())))
        .navigator(Arc::new(login_redirect.clone()))
        .build()?;
    let tracker = Tracker::new(client);

    let output = commands::Output { json: cli.json };
    // A 401 from these means wrong credentials, not an expired session
    let is_credentials = matches!(cli.command, Command::Login { .. } | Command::Register { .. });
    let result = commands::run(cli.command, &tracker, &mut config, output).await;

    if let Err(ref e) = result {
        let needs_login = login_redirect.login_required()
            || e.downcast_ref::<ApiError>().is_some_and(ApiError::requires_login);
        if needs_login && !is_credentials {
            eprintln!("Session expired. Run `apptrack login` to sign in again.");
        }
    }
    result
}
