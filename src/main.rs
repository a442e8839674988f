//! Crashline service binary
//!
//! Starts the round engine loop and the HTTP/WebSocket API in one process.

use clap::Parser;
use crashline::api::{server, AppState};
use crashline::config::AppConfig;
use crashline::engine::{InMemoryLedger, LogNotifier, RoundEngine};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crashline")]
#[command(about = "Crash game round engine", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override the server host
    #[arg(long)]
    host: Option<String>,

    /// Override the server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "crashline=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env(),
    };
    if let Some(host) = args.host {
        config.server.listen_address = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let ledger = Arc::new(InMemoryLedger::new());
    let engine = Arc::new(RoundEngine::new(
        config.engine.clone(),
        ledger.clone(),
        Arc::new(LogNotifier),
    ));

    tokio::spawn(engine.clone().run());
    info!(
        "engine running: {}s wait, {}ms tick, {}s crash pause",
        config.engine.waiting_secs, config.engine.tick_ms, config.engine.crash_pause_secs
    );

    let state = Arc::new(AppState { engine, ledger });
    server::run(&config.server, state).await?;
    Ok(())
}
