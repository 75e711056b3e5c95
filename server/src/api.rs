//! # REST API
//!
//! Builds the axum router that exposes the vault service's HTTP
//! interface. All endpoints share application state through axum's
//! `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/status`                     | Service status summary             |
//! | POST   | `/vaults`                     | Create a vault                     |
//! | GET    | `/vaults`                     | List all vaults                    |
//! | GET    | `/vaults/:id`                 | Vault by id                        |
//! | POST   | `/vaults/:id/reward-address`  | Register a reward address          |
//! | POST   | `/vaults/:id/assets`          | Record an observed asset balance   |
//! | PUT    | `/vaults/:id/threshold`       | Replace the USD threshold          |
//! | GET    | `/vaults/:id/value`           | Value the vault at oracle prices   |
//!
//! ## Error Mapping
//!
//! Every [`AccountingError`] kind maps to its own status so callers can
//! tell bad input, a missing vault, and a down oracle apart: invalid
//! argument → 400, not found → 404, duplicate id → 500 (defensive),
//! oracle failure → 502. Bodies are `{"error": "..."}`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use coffer_core::vault::{AccountingError, VaultAccounting, VaultId};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    /// The accounting layer, wired to its store and price source.
    pub accounting: Arc<VaultAccounting>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Configured upstream price endpoint (reported by `/status`).
    pub price_endpoint: String,
    /// When this process started serving.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/vaults", post(create_vault_handler).get(list_vaults_handler))
        .route("/vaults/:id", get(get_vault_handler))
        .route("/vaults/:id/reward-address", post(add_reward_address_handler))
        .route("/vaults/:id/assets", post(record_asset_handler))
        .route("/vaults/:id/threshold", put(update_threshold_handler))
        .route("/vaults/:id/value", get(value_vault_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Request body for `POST /vaults`.
#[derive(Debug, Deserialize)]
pub struct CreateVaultRequest {
    /// Owner reference (wallet/account string).
    pub owner: String,
    /// USD automation threshold.
    #[serde(rename = "thresholdsUSD")]
    pub thresholds_usd: f64,
}

/// Request body for `POST /vaults/:id/reward-address`.
#[derive(Debug, Deserialize)]
pub struct RewardAddressRequest {
    /// The distribution address to append.
    pub address: String,
}

/// Request body for `POST /vaults/:id/assets`.
#[derive(Debug, Deserialize)]
pub struct RecordAssetRequest {
    /// Asset symbol (e.g. "ETH").
    pub symbol: String,
    /// Observed balance. Overwrites any previous snapshot for the symbol.
    pub amount: f64,
}

/// Request body for `PUT /vaults/:id/threshold`.
#[derive(Debug, Deserialize)]
pub struct UpdateThresholdRequest {
    /// Replacement USD threshold.
    #[serde(rename = "thresholdsUSD")]
    pub thresholds_usd: f64,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Service software version.
    pub version: String,
    /// Number of vaults currently in the store.
    pub vault_count: usize,
    /// Configured upstream price endpoint.
    pub price_endpoint: String,
    /// Seconds since the service started.
    pub uptime_secs: i64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Generic error body returned by all endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps an accounting error to its response. The taxonomy is the whole
/// point — nothing here may collapse into a generic 500.
fn error_response(err: AccountingError) -> Response {
    let status = match &err {
        AccountingError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        AccountingError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountingError::DuplicateId(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AccountingError::Oracle(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// 400 with an error body, for boundary-level input problems (unparseable
/// ids, unreadable request bodies) that never reach the accounting layer.
fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

/// Parses a path segment as a [`VaultId`] or produces the 400 response.
fn parse_vault_id(raw: &str) -> Result<VaultId, Response> {
    raw.parse()
        .map_err(|_| bad_request(format!("invalid vault id: {}", raw)))
}

/// Unwraps a JSON body extraction or produces the 400 response. Body
/// problems (syntax, missing fields, wrong types) are caller input errors,
/// same as a failed domain validation.
fn require_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(bad_request(format!(
            "invalid request body: {}",
            rejection.body_text()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the service is alive.
///
/// Liveness probe for orchestrators. It intentionally does not check the
/// price upstream — that belongs in `/status` and the valuation path.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns a service status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resp = StatusResponse {
        version: state.version.clone(),
        vault_count: state.accounting.vault_count(),
        price_endpoint: state.price_endpoint.clone(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        timestamp: Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `POST /vaults` — creates a vault, returning 201 with the new record.
async fn create_vault_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateVaultRequest>, JsonRejection>,
) -> Response {
    let req = match require_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match state.accounting.create_vault(&req.owner, req.thresholds_usd) {
        Ok(vault) => {
            state.metrics.vaults_created_total.inc();
            state
                .metrics
                .vault_count
                .set(state.accounting.vault_count() as i64);
            (StatusCode::CREATED, Json(vault)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `GET /vaults` — lists all vaults in creation order.
async fn list_vaults_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.accounting.list_vaults())
}

/// `GET /vaults/:id` — returns a vault by id, or 404 if absent.
async fn get_vault_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.accounting.get_vault(id) {
        Some(vault) => (StatusCode::OK, Json(vault)).into_response(),
        None => error_response(AccountingError::NotFound(id)),
    }
}

/// `POST /vaults/:id/reward-address` — appends to the reward trail and
/// returns the updated vault.
async fn add_reward_address_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RewardAddressRequest>, JsonRejection>,
) -> Response {
    let id = match parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match require_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match state.accounting.add_reward_address(id, &req.address) {
        Ok(vault) => {
            state.metrics.reward_addresses_registered_total.inc();
            (StatusCode::OK, Json(vault)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/assets` — records an observed balance snapshot and
/// returns the updated vault. Replaying the same observation is a no-op,
/// so mirrored on-chain deposit events can be delivered at-least-once.
async fn record_asset_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RecordAssetRequest>, JsonRejection>,
) -> Response {
    let id = match parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match require_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match state
        .accounting
        .record_asset_balance(id, &req.symbol, req.amount)
    {
        Ok(vault) => {
            state.metrics.asset_snapshots_recorded_total.inc();
            (StatusCode::OK, Json(vault)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `PUT /vaults/:id/threshold` — replaces the USD automation threshold.
async fn update_threshold_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateThresholdRequest>, JsonRejection>,
) -> Response {
    let id = match parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match require_body(payload) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match state.accounting.update_threshold(id, req.thresholds_usd) {
        Ok(vault) => (StatusCode::OK, Json(vault)).into_response(),
        Err(err) => error_response(err),
    }
}

/// `GET /vaults/:id/value` — values the vault at current oracle prices.
///
/// An unreachable price upstream is a 502, never a silent zero — a zero
/// here means the vault is actually worth nothing at quoted prices.
async fn value_vault_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_vault_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let timer = state.metrics.valuation_latency_seconds.start_timer();
    let result = state.accounting.vault_usd_value(id).await;
    timer.observe_duration();

    match result {
        Ok(valuation) => {
            state.metrics.valuations_total.inc();
            (StatusCode::OK, Json(valuation)).into_response()
        }
        Err(err) => {
            if matches!(err, AccountingError::Oracle(_)) {
                state.metrics.valuation_failures_total.inc();
                tracing::warn!(vault_id = %id, error = %err, "valuation failed against price upstream");
            }
            error_response(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
