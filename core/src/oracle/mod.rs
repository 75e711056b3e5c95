//! # Price Oracle — The Only Door to the Outside World
//!
//! Valuation needs current USD prices, and prices live on somebody else's
//! server. This module is that boundary and nothing else: no vault state,
//! no business rules, just "given these asset ids, what do they cost".
//!
//! ```text
//! mod.rs    — PriceSource trait, error taxonomy, deterministic substitute
//! client.rs — HttpPriceOracle: the real reqwest-backed implementation
//! ```
//!
//! The trait is injected into the accounting layer as a collaborator
//! (dependency passed in, never looked up globally), so every test and
//! offline environment runs against [`StaticPriceSource`] instead of the
//! network.
//!
//! ## The Two Kinds of "No Price"
//!
//! A well-formed upstream response that simply omits an asset id means
//! "no price quoted" — the id is absent from the returned map and the
//! valuation fold prices it at 0. A transport failure, timeout, or
//! garbage payload means "we don't know" and is an [`OracleError`].
//! Conflating the two would make an unreachable oracle look like a
//! worthless treasury, and downstream automation acts on that number.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod client;

pub use client::HttpPriceOracle;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching prices.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The price service could not be reached, timed out, or answered
    /// with an error status. Bounded by
    /// [`config::PRICE_FETCH_TIMEOUT`](crate::config::PRICE_FETCH_TIMEOUT);
    /// a timeout surfaces here rather than hanging the caller.
    #[error("price service unreachable: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The price service answered, but the payload was not the expected
    /// `{<id>: {usd: <number>}}` shape.
    #[error("price service returned a malformed payload: {0}")]
    MalformedResponse(String),
}

// ---------------------------------------------------------------------------
// PriceSource
// ---------------------------------------------------------------------------

/// A source of current USD prices keyed by asset id.
///
/// Implementations perform no retry — retry/backoff policy belongs to the
/// boundary layer that decided it wanted a valuation in the first place.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches USD prices for a batch of asset ids.
    ///
    /// The returned map contains an entry for every id the upstream
    /// actually quoted; ids without a quote are simply absent. An empty
    /// input yields an empty map without touching the upstream.
    async fn fetch_prices(&self, asset_ids: &[String])
        -> Result<HashMap<String, f64>, OracleError>;

    /// Fetches the USD price for a single asset id, or `0` if the
    /// upstream quotes nothing for it.
    async fn fetch_price(&self, asset_id: &str) -> Result<f64, OracleError> {
        let ids = [asset_id.to_string()];
        let prices = self.fetch_prices(&ids).await?;
        Ok(prices.get(asset_id).copied().unwrap_or(0.0))
    }
}

// ---------------------------------------------------------------------------
// StaticPriceSource
// ---------------------------------------------------------------------------

/// A [`PriceSource`] backed by a fixed in-memory price table.
///
/// The deterministic substitute for tests and offline development: quotes
/// exactly what it was constructed with, never fails, never suspends on
/// anything real.
#[derive(Clone, Debug, Default)]
pub struct StaticPriceSource {
    prices: HashMap<String, f64>,
}

impl StaticPriceSource {
    /// Creates a source quoting the given price table.
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }

    /// Adds a quote, builder-style.
    pub fn with_price(mut self, asset_id: impl Into<String>, usd: f64) -> Self {
        self.prices.insert(asset_id.into(), usd);
        self
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_prices(
        &self,
        asset_ids: &[String],
    ) -> Result<HashMap<String, f64>, OracleError> {
        // Mirror the real upstream: only requested-and-quoted ids appear.
        Ok(asset_ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|p| (id.clone(), *p)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
