// crates/netdrift-api/src/main.rs
// ============================================================================
// Module: Netdrift Server Entry Point
// Description: Argument parsing, logging initialization, and server lifecycle.
// Purpose: Run the netdrift HTTP server from a TOML config file.
// Dependencies: clap, netdrift-api, tokio, tracing, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `netdrift` binary loads `netdrift.toml` (or the `--config` path),
//! initializes `tracing` with an env-filter, builds the engine over the
//! SQLite store, and serves HTTP until interrupted. On shutdown the
//! dispatcher workers are joined so in-flight webhook attempts settle before
//! exit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use netdrift_api::ApiConfig;
use netdrift_api::ServerError;
use netdrift_api::build_state;
use netdrift_api::router;
use tokio::net::TcpListener;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Intent and drift engine for network-device configuration.
#[derive(Debug, Parser)]
#[command(name = "netdrift", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "netdrift.toml")]
    config: PathBuf,

    /// Log filter directive (e.g. `info`, `netdrift=debug`).
    #[arg(long, env = "NETDRIFT_LOG", default_value = "info")]
    log: String,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Server entry point returning an exit code.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log);
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "netdrift server failed");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the global subscriber with the given filter directive.
fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads config, builds the engine, and serves until interrupted.
async fn run(args: &Args) -> Result<(), ServerError> {
    let config = ApiConfig::load(&args.config)?;
    let (state, dispatcher_handle) = build_state(&config)?;
    let app = router(state, config.server.max_body_bytes);

    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    info!(
        addr = %config.server.bind_addr,
        store = %config.store.path.display(),
        workers = config.dispatch.workers,
        "netdrift listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    dispatcher_handle.shutdown();
    info!("dispatcher workers stopped");
    Ok(())
}
