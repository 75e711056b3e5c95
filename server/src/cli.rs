//! # CLI Interface
//!
//! Defines the command-line argument structure for `cofferd` using `clap`
//! derive. Supports three subcommands: `run`, `status`, and `version`.

use clap::{Parser, Subcommand};

use coffer_core::config;

/// Coffer treasury vault service.
///
/// Tracks per-owner vault balances and reward addresses, and values
/// vaults in USD against a configurable price oracle. Serves a REST API
/// and Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "cofferd",
    about = "Coffer treasury vault service",
    version,
    propagate_version = true
)]
pub struct CofferCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `cofferd` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault service.
    Run(RunArgs),
    /// Query the status of a running instance via its REST endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST API.
    #[arg(long, env = "COFFER_API_PORT", default_value_t = config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "COFFER_METRICS_PORT", default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Upstream price endpoint speaking the simple-price shape
    /// (`?ids=<id>&vs_currencies=usd`).
    #[arg(long, env = "COFFER_PRICE_ENDPOINT", default_value = config::DEFAULT_PRICE_ENDPOINT)]
    pub price_endpoint: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "COFFER_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// REST endpoint of the running instance.
    #[arg(long, default_value = "http://127.0.0.1:8531")]
    pub api_url: String,
}
