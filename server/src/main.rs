// Copyright (c) 2026 Coffer Labs. MIT License.
// See LICENSE for details.

//! # Coffer Vault Service
//!
//! Entry point for the `cofferd` binary. Parses CLI arguments, initializes
//! logging and metrics, wires the vault store and price oracle into the
//! accounting layer, and serves the REST API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the vault service
//! - `status`  — query a running instance's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use coffer_core::oracle::HttpPriceOracle;
use coffer_core::vault::{VaultAccounting, VaultStore};

use cli::{CofferCli, Commands};
use logging::LogFormat;
use metrics::ServiceMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CofferCli::parse();

    match cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full vault service: REST API and metrics endpoint.
async fn run_service(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "cofferd=info,coffer_core=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        price_endpoint = %args.price_endpoint,
        "starting cofferd"
    );

    // --- Store and oracle ---
    // The store lives for the process lifetime; a durable backend slots in
    // here without touching the accounting layer.
    let store = Arc::new(VaultStore::new());
    let oracle = Arc::new(HttpPriceOracle::new(args.price_endpoint.clone()));

    // --- Accounting ---
    let accounting = Arc::new(VaultAccounting::new(store, oracle));

    // --- Metrics ---
    let service_metrics = Arc::new(ServiceMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        accounting,
        metrics: Arc::clone(&service_metrics),
        price_endpoint: args.price_endpoint.clone(),
        started_at: chrono::Utc::now(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&service_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("cofferd stopped");
    Ok(())
}

/// Queries a running instance's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .text()
        .await
        .context("failed to read status response")?;
    println!("{}", body);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("cofferd {}", env!("CARGO_PKG_VERSION"));
    println!("core    {}", coffer_core::config::CORE_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
