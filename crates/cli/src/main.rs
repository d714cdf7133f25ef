//! inkdesk CLI - admin back-office session client

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use inkdesk_admin::SessionManager;
use inkdesk_core::{Navigator, Redirect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "inkdesk")]
#[command(about = "Sign in to the inkdesk admin API and inspect your access")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "INKDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding the stored session and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the admin API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Tells the user to sign in again when the session is forcibly ended
struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate(&self, redirect: Redirect) {
        if redirect.is_login() {
            eprintln!("Your session has ended. Run `inkdesk login` to sign in again.");
        } else {
            debug!(%redirect, "Ignoring redirect");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = config::Overrides {
        data_dir: cli.data_dir.clone(),
        api_url: cli.api_url.clone(),
    };
    let admin_config = config::load(cli.config.as_deref(), overrides)?;

    let log_file = (!cli.no_file_log).then(|| admin_config.data_dir.join("inkdesk.log"));
    logging::init_logging(cli.log_level.into(), log_file)?;
    debug!(api_url = %admin_config.api_url, "Starting inkdesk CLI");

    let manager = SessionManager::from_config(&admin_config, Arc::new(CliNavigator))?;
    let mut notifications = manager.notifier().subscribe();
    let run = cli.command.execute(&manager, &admin_config, cli.json);

    let result = if cli.timeout == 0 {
        run.await
    } else {
        match tokio::time::timeout(Duration::from_secs(cli.timeout), run).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Command timed out after {} seconds",
                cli.timeout
            )),
        }
    };

    while let Ok(notification) = notifications.try_recv() {
        eprintln!("{notification}");
    }

    if let Err(e) = result {
        error!("Command failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
