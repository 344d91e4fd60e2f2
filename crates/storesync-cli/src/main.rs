//! storesync - Resilient catalog sync for WooCommerce-compatible stores
//!
//! Pulls every page of a store resource over the REST API and writes it
//! to an xlsx workbook with one sheet per category.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use storesync_core::{CancelToken, ProgressContext, SyncError};
use storesync_export::ExportError;

mod cmd;
mod config;

use cmd::Session;
use config::Config;

/// Exit status after an interrupt, as a shell would report it
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "storesync")]
#[command(about = "Sync store catalogs into category-grouped spreadsheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./storesync.toml or ~/.config/storesync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Store base URL (overrides config and WC_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every page of a resource and export it by category
    Fetch(cmd::fetch::FetchArgs),
    /// Fetch and print a single entity
    Show(cmd::show::ShowArgs),
    /// Check that the store answers with the configured credentials
    Health,
    /// Detect which API version the store serves
    ApiVersion,
    /// Print store environment information
    Info,
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    storesync_core::init_logging(quiet, cli.debug, multi);

    let cancel = CancelToken::new();
    match run(cli, progress, cancel.clone()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            if let Some(hint) = remediation(&e) {
                log::error!("hint: {hint}");
            }
            if cancel.is_cancelled() || is_cancellation(&e) {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli, progress: storesync_core::SharedProgress, cancel: CancelToken) -> Result<()> {
    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    if let Command::Config = cli.command {
        show_config(&config);
        return Ok(());
    }

    setup_signal_handler(&cancel)?;

    // Client settings (config file and WC_* defaults, CLI overrides)
    let mut client = config.store.to_client_config();
    if let Some(url) = cli.url {
        client.base_url = url;
    }
    if let Some(timeout) = cli.timeout {
        client.timeout_secs = timeout;
    }
    if let Some(max_retries) = cli.max_retries {
        client.max_retries = max_retries;
    }

    let session = Session {
        client,
        progress,
        cancel,
    };

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &session),
        Command::Show(args) => cmd::show::run(args, &config, &session),
        Command::Health => cmd::probe::health(&session),
        Command::ApiVersion => cmd::probe::api_version(&session),
        Command::Info => cmd::probe::info(&session),
        Command::Config => Ok(()),
    }
}

/// First SIGINT/SIGTERM cancels cooperatively; a second one exits at once.
fn setup_signal_handler(cancel: &CancelToken) -> Result<()> {
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(
            sig,
            i32::from(EXIT_INTERRUPTED),
            cancel.flag(),
        )
        .context("Failed to register signal handler")?;
        signal_hook::flag::register(sig, cancel.flag())
            .context("Failed to register signal handler")?;
    }
    Ok(())
}

fn remediation(e: &anyhow::Error) -> Option<&'static str> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .and_then(SyncError::remediation)
}

fn is_cancellation(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<SyncError>()
            .is_some_and(SyncError::is_cancelled)
            || matches!(cause.downcast_ref::<ExportError>(), Some(ExportError::Cancelled))
    })
}

fn show_config(config: &Config) {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

    let store = &config.store;
    let client = store.to_client_config();
    let configured = |value: &str| {
        if value.is_empty() {
            "not set"
        } else {
            "configured"
        }
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let url = if client.base_url.is_empty() {
        "not set".to_string()
    } else {
        client.base_url.clone()
    };
    table.add_row(vec!["Store URL", &url]);
    table.add_row(vec!["Consumer key", configured(&client.api_key)]);
    table.add_row(vec!["Consumer secret", configured(&client.api_secret)]);
    table.add_row(vec![
        "API",
        &format!("{}/{}", client.api_prefix, client.api_version),
    ]);
    table.add_row(vec![
        "Auth",
        if client.query_string_auth {
            "query string"
        } else {
            "basic"
        },
    ]);
    table.add_row(vec!["User agent", client.user_agent()]);
    table.add_row(vec!["Timeout", &format!("{}s", client.timeout_secs)]);
    table.add_row(vec!["Max retries", &client.max_retries.to_string()]);
    table.add_row(vec!["Retry delay", &format!("{}ms", client.retry_delay_ms)]);
    table.add_row(vec!["Page size", &client.page_size.to_string()]);
    table.add_row(vec![
        "Page delay",
        &format!("{}ms", client.inter_page_delay_ms),
    ]);
    table.add_row(vec![
        "Output directory",
        &config.output.default_dir.display().to_string(),
    ]);
    table.add_row(vec!["List delimiter", &format!("{:?}", config.output.delimiter)]);
    table.add_row(vec!["Uncategorized sheet", &config.output.uncategorized_title]);

    eprintln!("\n{table}");
}
