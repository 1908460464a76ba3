//! OastBeacon CLI
//!
//! Out-of-band interaction client: run the local HTTP shell, or watch a
//! single callback domain from the terminal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use oastbeacon_client::{register_with_fallback, InteractionClient, SessionRegistry};
use oastbeacon_daemon::ApiState;
use oastbeacon_settings::Settings;

/// OastBeacon - out-of-band interaction client
#[derive(Parser)]
#[command(name = "oastbeacon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP shell until interrupted
    Serve {
        /// Listen address, e.g. 127.0.0.1:5000
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Register a session, print its domain and stream interactions
    Watch {
        /// Preferred relay; known relays are tried after it
        #[arg(short, long)]
        server: Option<String>,

        /// Seconds between polls
        #[arg(short, long)]
        interval: Option<u64>,

        /// Authorization header for private relays
        #[arg(short, long)]
        authorization: Option<String>,
    },

    /// Show the effective settings
    Config {
        /// Write the settings file if it does not exist yet
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    oastbeacon_logging::init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load_or_default(),
    }
    .context("Failed to load settings")?;

    match cli.command {
        Commands::Serve { bind } => {
            serve(&settings, bind).await?;
        }
        Commands::Watch {
            server,
            interval,
            authorization,
        } => {
            watch(&settings, server, interval, authorization).await?;
        }
        Commands::Config { init } => {
            show_config(&settings, init)?;
        }
    }

    Ok(())
}

async fn serve(settings: &Settings, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| settings.server.bind_address.clone());
    let state = ApiState::new(SessionRegistry::new(), settings.relay.clone());

    info!("Starting HTTP shell on {}", bind);
    oastbeacon_daemon::serve(&bind, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
    })
    .await?;

    Ok(())
}

async fn watch(
    settings: &Settings,
    server: Option<String>,
    interval: Option<u64>,
    authorization: Option<String>,
) -> Result<()> {
    let mut relay = settings.relay.clone();
    if authorization.is_some() {
        relay.authorization = authorization;
    }

    let servers = relay.candidate_servers(server.as_deref());
    let (mut client, registration) = register_with_fallback(&servers, |host| {
        InteractionClient::new(relay.client_config(Some(host)))
    })
    .await
    .context("No relay accepted the session")?;

    println!("{}", registration.domain);
    info!(
        "Watching {} (correlation id {})",
        registration.domain, registration.correlation_id
    );

    let seconds = interval.unwrap_or(settings.watch.poll_interval_secs).max(1);
    let result = poll_until_interrupted(&client, Duration::from_secs(seconds)).await;

    let outcome = client.deregister().await?;
    if !outcome.success {
        warn!(
            "Relay did not release the session: {}",
            outcome.error.unwrap_or_default()
        );
        client.evict();
    }

    result
}

async fn poll_until_interrupted(client: &InteractionClient, period: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.poll().await {
                    Ok(records) => {
                        for record in records {
                            println!("{}", serde_json::to_string(&record)?);
                        }
                    }
                    Err(e) if e.is_retryable() => warn!("Poll failed: {}", e),
                    Err(e) => return Err(e).context("Poll failed"),
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

fn show_config(settings: &Settings, init: bool) -> Result<()> {
    if let Some(path) = settings.config_path() {
        if init && !path.exists() {
            settings.save().context("Failed to write settings")?;
        }
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
