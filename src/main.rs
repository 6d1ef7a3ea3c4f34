//! dirsession: directory session manager CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!   dirsession.toml ──▶ config ──▶ ConnectionConfig
//!                                       │
//!                                       ▼
//!   ┌────────────────────────── ConnectionManager ──────────────────────────┐
//!   │                                                                       │
//!   │  execute() ──▶ acquire ──▶ session (ldap3) ──▶ failure path           │
//!   │                   ▲                               │                   │
//!   │                   │                   classify ───┴─── backoff        │
//!   │          reconnect timer ◀────────────────────────────────┘           │
//!   │          health monitor ─────▶ probe ──▶ failure path                 │
//!   │                                                                       │
//!   │  status watch / event broadcast ──▶ `watch` subcommand, metrics, logs │
//!   └───────────────────────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dirsession::backend::LdapConnector;
use dirsession::config::{load_config, locate_config, search_paths, ConfigError};
use dirsession::lifecycle::signals::wait_for_termination;
use dirsession::observability::{logging, metrics};
use dirsession::{ConnectionEvent, ConnectionManager};

#[derive(Parser)]
#[command(name = "dirsession")]
#[command(about = "Keep an authenticated directory session alive", long_about = None)]
struct Cli {
    /// Configuration file (overrides the search path)
    #[arg(short, long, env = "DIRSESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Directory profile name (defaults to the first one)
    #[arg(short, long)]
    directory: Option<String>,

    /// User name to bind as
    #[arg(short, long)]
    user: Option<String>,

    /// Bind password
    #[arg(long, env = "DIRSESSION_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured directories
    List,
    /// Connect, read the base entry and print the connection status
    Check,
    /// Connect and stream connection events until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = locate_config(cli.config.as_deref(), &search_paths())?;
    let config = load_config(&path)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(path = %path.display(), "Configuration loaded");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Commands::List = cli.command {
        for profile in &config.directories {
            println!(
                "{}\t{}:{}\t{}\t{}",
                profile.name,
                profile.server,
                profile.effective_port(),
                if profile.use_tls { "tls" } else { "plain" },
                profile.base_dn
            );
        }
        return Ok(());
    }

    let profile = config
        .directory(cli.directory.as_deref())
        .ok_or_else(|| ConfigError::UnknownDirectory {
            name: cli.directory.clone().unwrap_or_default(),
            available: config
                .directory_names()
                .into_iter()
                .map(String::from)
                .collect(),
        })?;
    let user = cli.user.ok_or("--user is required")?;
    let password = cli
        .password
        .filter(|p| !p.is_empty())
        .ok_or("--password or DIRSESSION_PASSWORD is required")?;

    let manager = ConnectionManager::new(
        profile.to_connection_config(&user, &password),
        LdapConnector::new(),
    );
    manager.on_authentication_failure(|failure| {
        eprintln!("authentication failed ({}): {}", failure.origin, failure.message);
    });
    manager.on_retries_exhausted(|notice| {
        eprintln!(
            "giving up after {} attempts: {}",
            notice.attempts, notice.last_error
        );
    });

    match cli.command {
        Commands::List => {}
        Commands::Check => {
            let base_dn = manager.config().base_dn.clone();
            let result = manager
                .execute(|session| {
                    let dn = base_dn.clone();
                    Box::pin(async move { session.read_entry(&dn).await })
                })
                .await;

            match &result {
                Ok(attrs) => tracing::info!(attributes = attrs.len(), "Base entry read"),
                Err(e) => tracing::error!(error = %e, "Check failed"),
            }
            println!("{}", serde_json::to_string_pretty(&manager.status())?);
            manager.shutdown().await;
            result?;
        }
        Commands::Watch => {
            let mut events = manager.subscribe();
            if let Err(e) = manager.connect().await {
                tracing::warn!(error = %e, "Initial connect did not succeed");
            }

            let terminate = wait_for_termination();
            tokio::pin!(terminate);
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => println!("{}", describe(&event)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Event stream lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = &mut terminate => {
                        tracing::info!("Termination signal received");
                        break;
                    }
                }
            }
            manager.shutdown().await;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn describe(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::StateChanged { from, to, failure } => match failure {
            Some(f) => format!("{} -> {} [{} {}: {}]", from, to, f.kind, f.origin, f.message),
            None => format!("{} -> {}", from, to),
        },
        ConnectionEvent::ReconnectScheduled {
            attempt,
            max_retries,
            delay,
        } => format!(
            "reconnect {}/{} in {:.1}s",
            attempt,
            max_retries,
            delay.as_secs_f64()
        ),
        ConnectionEvent::AuthenticationFailed(failure) => {
            format!("authentication failed: {}", failure.message)
        }
        ConnectionEvent::RetriesExhausted(notice) => format!(
            "retries exhausted after {} attempts: {}",
            notice.attempts, notice.last_error
        ),
    }
}
