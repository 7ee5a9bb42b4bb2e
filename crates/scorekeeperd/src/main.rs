use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scorekeeper_core::{init_tracing, ScoringConfig, ScoringQueue, ScoringWorker, METRICS};
use scorekeeper_state::{StoreLocation, SurrealScoreStore};
use scorekeeperd::{router, AppState};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "scorekeeperd")]
#[command(about = "Scorekeeper submission, scoring and ranking service")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SCOREKEEPER_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Use a throwaway in-memory store instead of SURREALDB_* settings
    #[arg(long)]
    memory: bool,

    /// Emit JSON log lines
    #[arg(long, env = "SCOREKEEPER_LOG_JSON")]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(args.json, level);

    let location = if args.memory {
        StoreLocation::Memory
    } else {
        StoreLocation::from_env()
    };
    info!(store = %location.describe(), "connecting to store");
    let store = Arc::new(
        SurrealScoreStore::connect(&location)
            .await
            .context("failed to connect to store")?,
    );

    let config = ScoringConfig::from_env().context("invalid scoring configuration")?;
    let worker = Arc::new(ScoringWorker::new(store.clone(), store.clone(), config));
    let queue = ScoringQueue::start(worker);

    let recovery = queue.handle();
    let recovery_store = store.clone();
    tokio::spawn(async move {
        if let Err(e) = recovery.recover_pending(recovery_store.as_ref()).await {
            warn!(error = %e, "pending recovery failed");
        }
    });

    let state = Arc::new(AppState::new(store, Arc::new(queue.handle())));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %listener.local_addr()?, "scorekeeperd listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("draining scoring queue");
    queue.shutdown().await;
    METRICS.flush();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
