//! modstore admin tool
//!
//! Inspects a modstore data directory and rebuilds its entity index.
//!
//! Usage:
//!   modstore-admin --data-dir ./data rebuild-index
//!   modstore-admin query --flag muted
//!   modstore-admin show user:<uuid>
//!   modstore-admin serve --listen 127.0.0.1:4010

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modstore_admin::{build_router, AdminConfig, AppState};
use modstore_index::ScanOutcome;
use modstore_types::EntityKey;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "modstore-admin")]
#[command(about = "Inspect modstore data and rebuild its entity index")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the entity index from every stored document
    RebuildIndex,
    /// List entities with a flag set
    Query {
        #[arg(long)]
        flag: String,
    },
    /// Print one entity's document and summary
    Show { key: String },
    /// Serve the read-only HTTP API
    Serve {
        /// Address to bind (overrides the configuration file)
        #[arg(short, long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut config = AdminConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let opened = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || AppState::open(&config)).await?
    };
    let state = opened.with_context(|| format!("failed to open {}", config.data_dir.display()))?;

    match args.command {
        Command::RebuildIndex => rebuild(state).await,
        Command::Query { flag } => query(state, flag).await,
        Command::Show { key } => show(state, &key).await,
        Command::Serve { listen } => serve(state, listen.unwrap_or(config.listen)).await,
    }
}

async fn rebuild(state: AppState) -> Result<()> {
    let index = state.index.clone();
    match tokio::task::spawn_blocking(move || index.run_scan()).await?? {
        ScanOutcome::Completed { indexed, skipped } => {
            println!("Indexed {indexed} entities ({skipped} skipped)");
        }
        ScanOutcome::NotStarted => println!("A scan is already running"),
    }
    Ok(())
}

async fn query(state: AppState, flag: String) -> Result<()> {
    let index = state.index.clone();
    let keys = tokio::task::spawn_blocking(move || {
        // A one-shot command has nobody to serve while rebuilding.
        if index.is_stale() {
            index.run_scan()?;
        }
        index.flagged(&flag)
    })
    .await??;
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

async fn show(state: AppState, key: &str) -> Result<()> {
    let key = EntityKey::parse(key)?;
    let entity = tokio::task::spawn_blocking(move || {
        if state.index.is_stale() {
            state.index.run_scan()?;
        }
        state.entity(key)
    })
    .await??;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

async fn serve(state: AppState, listen: String) -> Result<()> {
    if state.index.start() {
        info!("Rebuilding stale index in the background");
    }

    let entities = state.entities.clone();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!("HTTP API listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    let report = tokio::task::spawn_blocking(move || entities.save_all()).await?;
    if !report.is_ok() {
        warn!(failed = report.failed.len(), "Some records could not be saved on shutdown");
    }
    info!("Shut down");
    Ok(())
}
