//! HTTP price-oracle client.
//!
//! Speaks the simple-price shape (`GET <endpoint>?ids=<a>,<b>&vs_currencies=usd`
//! returning `{<id>: {usd: <number>}}`) that CoinGecko popularized and most
//! self-hosted price proxies imitate. The endpoint is configurable per
//! deployment; the shape is not.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::debug;

use crate::config;

use super::{OracleError, PriceSource};

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// One per-asset entry in the upstream payload.
///
/// The upstream may quote additional currencies per asset; only `usd` is
/// read. A present asset with no `usd` key counts as "no price quoted".
#[derive(Debug, Deserialize)]
struct PriceQuote {
    #[serde(default)]
    usd: Option<f64>,
}

/// Reduces a parsed payload to `{requested id -> usd price}`, dropping ids
/// the upstream didn't quote. Pure, so the policy is testable without a
/// server on the other end.
fn collect_prices(
    payload: &HashMap<String, PriceQuote>,
    asset_ids: &[String],
) -> HashMap<String, f64> {
    asset_ids
        .iter()
        .filter_map(|id| {
            payload
                .get(id)
                .and_then(|quote| quote.usd)
                .map(|usd| (id.clone(), usd))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HttpPriceOracle
// ---------------------------------------------------------------------------

/// [`PriceSource`] implementation backed by a real HTTP price service.
///
/// Every request carries the bounded
/// [`PRICE_FETCH_TIMEOUT`](crate::config::PRICE_FETCH_TIMEOUT); an upstream
/// that hangs becomes an [`OracleError::Upstream`] instead of a stuck
/// valuation.
pub struct HttpPriceOracle {
    http: HttpClient,
    endpoint: String,
}

impl HttpPriceOracle {
    /// Creates a client against the given price endpoint
    /// (e.g. `https://api.coingecko.com/api/v3/simple/price`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(config::PRICE_FETCH_TIMEOUT)
            .build()
            .expect("static reqwest client options are valid");
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Creates a client against the default public endpoint.
    pub fn with_default_endpoint() -> Self {
        Self::new(config::DEFAULT_PRICE_ENDPOINT)
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PriceSource for HttpPriceOracle {
    async fn fetch_prices(
        &self,
        asset_ids: &[String],
    ) -> Result<HashMap<String, f64>, OracleError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = config::price_query_url(&self.endpoint, asset_ids);
        debug!(url = %url, ids = asset_ids.len(), "fetching prices");

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;

        let payload: HashMap<String, PriceQuote> = serde_json::from_str(&body)
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        let prices = collect_prices(&payload, asset_ids);
        debug!(
            quoted = prices.len(),
            requested = asset_ids.len(),
            "prices fetched"
        );
        Ok(prices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HashMap<String, PriceQuote> {
        serde_json::from_str(json).expect("well-formed payload")
    }

    #[test]
    fn collect_prices_reads_usd_quotes() {
        let payload = parse(r#"{"ethereum": {"usd": 1800.0}, "bitcoin": {"usd": 40000.0}}"#);
        let ids = vec!["ethereum".to_string(), "bitcoin".to_string()];

        let prices = collect_prices(&payload, &ids);
        assert_eq!(prices.get("ethereum"), Some(&1800.0));
        assert_eq!(prices.get("bitcoin"), Some(&40_000.0));
    }

    #[test]
    fn missing_id_is_absent_not_an_error() {
        let payload = parse(r#"{"ethereum": {"usd": 1800.0}}"#);
        let ids = vec!["ethereum".to_string(), "dogecoin".to_string()];

        let prices = collect_prices(&payload, &ids);
        assert_eq!(prices.len(), 1);
        assert!(!prices.contains_key("dogecoin"));
    }

    #[test]
    fn quote_without_usd_key_counts_as_unquoted() {
        let payload = parse(r#"{"ethereum": {"eur": 1650.0}}"#);
        let ids = vec!["ethereum".to_string()];

        let prices = collect_prices(&payload, &ids);
        assert!(prices.is_empty());
    }

    #[test]
    fn unrequested_ids_are_ignored() {
        let payload = parse(r#"{"ethereum": {"usd": 1800.0}, "bitcoin": {"usd": 40000.0}}"#);
        let ids = vec!["ethereum".to_string()];

        let prices = collect_prices(&payload, &ids);
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn top_level_array_payload_fails_to_parse() {
        let result: Result<HashMap<String, PriceQuote>, _> = serde_json::from_str("[1, 2, 3]");
        assert!(result.is_err());
    }
}
