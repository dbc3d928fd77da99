use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser, Subcommand};
use client_core::AccessConsole;
use shared::domain::{EventId, GuestId};
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::load_settings;
use session::Session;

/// Operator console for the QR access-control backend.
#[derive(Parser, Debug)]
#[command(name = "qrac", version)]
struct Cli {
    /// Settings file; defaults to ./qrac.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL, overriding the config file and QRAC_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Probe the backend.
    Health,
    #[command(subcommand)]
    Events(EventsCommand),
    #[command(subcommand)]
    Guests(GuestsCommand),
    /// Check a credential token in.
    Checkin { token: String },
    /// Interactive console.
    Shell,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum EventsCommand {
    List,
    Create {
        name: String,
        /// RFC 3339 date, e.g. 2025-06-01T19:00:00Z.
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum GuestsCommand {
    List {
        #[arg(long)]
        event: Option<EventId>,
    },
    Add {
        #[arg(long)]
        event: Option<EventId>,
        name: String,
        email: String,
    },
    Import {
        #[arg(long)]
        event: Option<EventId>,
        file: PathBuf,
    },
    Resend {
        #[arg(long)]
        event: Option<EventId>,
        guest_id: GuestId,
    },
    Qr {
        guest_id: GuestId,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut settings = load_settings(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }

    let console = AccessConsole::new(settings.console_config())
        .with_context(|| format!("cannot use API URL '{}'", settings.api_url))?;
    let mut session = Session::new(console);

    match cli.command {
        Command::Shell => session.repl().await,
        command => session.execute(command).await,
    }
}
