//! Marketplace command-line client
//!
//! Thin binary over `api-client`:
//! 1. Loads configuration and picks the credential store
//! 2. Builds an `AuthClient` with a terminal navigator
//! 3. Runs one command, refreshing the session when the backend asks
//! 4. Exits with status 2 when the session had to be terminated

mod config;
mod metrics;
mod navigator;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{ApiResponse, AuthClient, PendingRequest};
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde::Serialize;
use session::{CredentialKey, CredentialStore, FileStore, MemoryStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, StorageKind};
use crate::navigator::TerminalNavigator;

/// Exit status for a command that ended the session.
const EXIT_SESSION_TERMINATED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "marketplace", version, about = "Authenticated marketplace API client")]
struct Cli {
    /// Config file (default: MARKETPLACE_CONFIG, then ./marketplace.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, env = "MARKETPLACE_API_URL", global = true)]
    api_url: Option<String>,

    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the issued credentials
    Login {
        #[arg(long)]
        email: String,
        /// Read the password from this file instead of MARKETPLACE_PASSWORD or stdin
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Restore the stored session and show the signed-in user
    Whoami,
    /// Send an authenticated request
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path below the base URL, e.g. /products/42
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Clear the stored credentials
    Logout,
    /// Show which credentials are stored, without contacting the backend
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Stdout carries command output, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let prometheus = cli.metrics.then(metrics::install_recorder);

    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    let mut config = Config::load_resolved(&config_path, explicit)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(url) = cli.api_url {
        config
            .override_base_url(url)
            .context("invalid --api-url / MARKETPLACE_API_URL")?;
    }

    info!(
        path = %config_path.display(),
        base_url = %config.api.base_url,
        storage = ?config.session.storage,
        refresh_mode = ?config.refresh_mode(),
        "configuration loaded"
    );

    let store: Arc<dyn CredentialStore> = match config.session.storage {
        StorageKind::Memory => Arc::new(MemoryStore::new()),
        StorageKind::File => {
            let path = config.credential_file()?;
            Arc::new(
                FileStore::load(path.clone())
                    .with_context(|| format!("failed to open {}", path.display()))?,
            )
        }
    };
    let navigator = Arc::new(TerminalNavigator::new());
    let client = AuthClient::new(config.client_config(), store, navigator.clone())?;

    let is_logout = matches!(cli.command, Command::Logout);
    let outcome = execute(&client, cli.command).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    // Logout ends the session on purpose
    if navigator.redirected() && !is_logout {
        if let Err(e) = &outcome {
            eprintln!("error: {e:#}");
        }
        return Ok(ExitCode::from(EXIT_SESSION_TERMINATED));
    }
    outcome.map(|()| ExitCode::SUCCESS)
}

async fn execute(client: &AuthClient, command: Command) -> Result<()> {
    match command {
        Command::Login {
            email,
            password_file,
        } => {
            let password =
                config::read_password(password_file.as_deref(), std::io::stdin().lock())?;
            let user = client
                .login(&email, password.expose())
                .await
                .context("login failed")?;
            print_json(&user)
        }

        Command::Whoami => match client.bootstrap().await? {
            Some(user) => print_json(&user),
            None => {
                println!("not signed in");
                Ok(())
            }
        },

        Command::Request { method, path, data } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method: {method}"))?;
            let mut request = PendingRequest::new(method, path);
            if let Some(data) = data {
                let body = serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.with_json(body);
            }

            let response = client.send(request).await?;
            print_response(&response)?;
            if !response.is_success() {
                anyhow::bail!("request failed with status {}", response.status);
            }
            Ok(())
        }

        Command::Logout => {
            client.logout()?;
            println!("signed out");
            Ok(())
        }

        Command::Status => {
            let store = client.store();
            let present = |key: CredentialKey| {
                if store.get(key).is_some() {
                    "present"
                } else {
                    "absent"
                }
            };
            println!("base url:           {}", client.base_url());
            println!("access credential:  {}", present(CredentialKey::Access));
            println!("refresh credential: {}", present(CredentialKey::Refresh));
            println!("refresh mode:       {:?}", client.refresh_mode());
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_response(response: &ApiResponse) -> Result<()> {
    println!("{}", response.status);
    match response.json::<serde_json::Value>() {
        Ok(body) => print_json(&body),
        Err(_) => {
            let text = response.text();
            if !text.is_empty() {
                println!("{text}");
            }
            Ok(())
        }
    }
}
