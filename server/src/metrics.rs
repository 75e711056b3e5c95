//! # Prometheus Metrics
//!
//! Operational metrics for the vault service, scraped at the `/metrics`
//! HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the service.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers.
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of vaults created.
    pub vaults_created_total: IntCounter,
    /// Total number of reward addresses registered across all vaults.
    pub reward_addresses_registered_total: IntCounter,
    /// Total number of asset balance snapshots recorded.
    pub asset_snapshots_recorded_total: IntCounter,
    /// Total number of valuations computed (successful fetch + fold).
    pub valuations_total: IntCounter,
    /// Total number of valuations that failed against the price upstream.
    pub valuation_failures_total: IntCounter,
    /// Current number of vaults in the store.
    pub vault_count: IntGauge,
    /// Histogram of end-to-end valuation latency in seconds (dominated by
    /// the upstream price fetch).
    pub valuation_latency_seconds: Histogram,
}

impl ServiceMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("coffer".into()), None)
            .expect("failed to create prometheus registry");

        let vaults_created_total =
            IntCounter::new("vaults_created_total", "Total number of vaults created")
                .expect("metric creation");
        registry
            .register(Box::new(vaults_created_total.clone()))
            .expect("metric registration");

        let reward_addresses_registered_total = IntCounter::new(
            "reward_addresses_registered_total",
            "Total number of reward addresses registered across all vaults",
        )
        .expect("metric creation");
        registry
            .register(Box::new(reward_addresses_registered_total.clone()))
            .expect("metric registration");

        let asset_snapshots_recorded_total = IntCounter::new(
            "asset_snapshots_recorded_total",
            "Total number of asset balance snapshots recorded",
        )
        .expect("metric creation");
        registry
            .register(Box::new(asset_snapshots_recorded_total.clone()))
            .expect("metric registration");

        let valuations_total = IntCounter::new(
            "valuations_total",
            "Total number of vault valuations computed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(valuations_total.clone()))
            .expect("metric registration");

        let valuation_failures_total = IntCounter::new(
            "valuation_failures_total",
            "Total number of valuations that failed against the price upstream",
        )
        .expect("metric creation");
        registry
            .register(Box::new(valuation_failures_total.clone()))
            .expect("metric registration");

        let vault_count = IntGauge::new("vault_count", "Current number of vaults in the store")
            .expect("metric creation");
        registry
            .register(Box::new(vault_count.clone()))
            .expect("metric registration");

        let valuation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "valuation_latency_seconds",
                "End-to-end vault valuation latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(valuation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            vaults_created_total,
            reward_addresses_registered_total,
            asset_snapshots_recorded_total,
            valuations_total,
            valuation_failures_total,
            vault_count,
            valuation_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<ServiceMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
