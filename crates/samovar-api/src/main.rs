//! Samovar entry point.
//!
//! Parses CLI arguments, initializes state and adapters, then either
//! validates the configuration (`check`) or runs the REST API server
//! (`serve`) with its background maintenance and persistence loops.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

/// How often idle conversations are checked against the TTL.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// How often in-memory state is flushed to disk.
const SAVE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,samovar=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check => check(cli.data_dir).await,
        Commands::Serve { host, port } => serve(cli.data_dir, &host, port).await,
    }
}

/// Print the effective settings after config loading.
async fn check(data_dir: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let data_dir = data_dir.unwrap_or_else(samovar_infra::config::resolve_data_dir);
    let settings = samovar_infra::config::load_settings(&data_dir).await;
    println!("data directory: {}", data_dir.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn serve(
    data_dir: Option<std::path::PathBuf>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let app = AppState::init(data_dir).await?;
    let cancel = CancellationToken::new();

    let maintenance = {
        let engine = app.engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            engine.run_maintenance(MAINTENANCE_INTERVAL, cancel).await;
        })
    };

    let save_loop = {
        let app = app.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SAVE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup does
            // not rewrite what was just loaded.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(err) = app.save().await {
                            tracing::warn!(error = %err, "periodic save failed");
                        }
                    }
                }
            }
        })
    };

    let router = http::router::build_router(app.clone());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                }
            }
        })
        .await?;

    cancel.cancel();
    let _ = tokio::join!(maintenance, save_loop);

    // Final save so nothing since the last periodic flush is lost.
    if let Err(err) = app.save().await {
        tracing::error!(error = %err, "final save failed");
    } else {
        tracing::info!("state saved, bye");
    }
    Ok(())
}
