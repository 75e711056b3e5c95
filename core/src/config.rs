//! # Service Configuration & Constants
//!
//! Every magic number in Coffer lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These are operational defaults, not consensus parameters — all of them
//! can be overridden per deployment through the `cofferd` CLI or its
//! environment variables.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Service Identity
// ---------------------------------------------------------------------------

/// Service name used in metrics namespaces and log targets.
pub const SERVICE_NAME: &str = "coffer";

/// The full version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default REST API port.
pub const DEFAULT_API_PORT: u16 = 8531;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 8532;

// ---------------------------------------------------------------------------
// Price Oracle
// ---------------------------------------------------------------------------

/// Default upstream price endpoint. CoinGecko's simple-price API shape:
/// `GET <endpoint>?ids=<id>&vs_currencies=usd` returning `{<id>: {usd: n}}`.
/// Any service speaking the same shape can be swapped in per deployment.
pub const DEFAULT_PRICE_ENDPOINT: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Quote currency requested from the oracle. Valuations are USD-denominated
/// end to end; this is not configurable because `thresholdsUSD` isn't either.
pub const PRICE_VS_CURRENCY: &str = "usd";

/// Upper bound on a single price fetch, connection establishment included.
/// The fetch is the only suspending operation in the core — if the upstream
/// hangs, we surface an unavailability error rather than wedging valuation
/// callers behind it.
pub const PRICE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Input Bounds
// ---------------------------------------------------------------------------

/// Maximum accepted length for an owner identifier, in bytes. Owner strings
/// are opaque wallet/account references; 256 bytes covers every address
/// format we've seen plus generous headroom.
pub const MAX_OWNER_LENGTH: usize = 256;

/// Maximum accepted length for an asset symbol, in bytes.
pub const MAX_SYMBOL_LENGTH: usize = 64;

/// Maximum accepted length for a reward address, in bytes. No per-chain
/// format validation happens here — address formats are a boundary concern
/// for whichever chain the distribution runs on.
pub const MAX_ADDRESS_LENGTH: usize = 256;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Builds the price-service query URL for a batch of asset ids.
///
/// Ids are comma-joined into a single `ids=` parameter, which is how the
/// upstream expects batch requests.
pub fn price_query_url(endpoint: &str, asset_ids: &[String]) -> String {
    format!(
        "{}?ids={}&vs_currencies={}",
        endpoint.trim_end_matches('/'),
        asset_ids.join(","),
        PRICE_VS_CURRENCY,
    )
}
