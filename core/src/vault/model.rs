//! # Vault Entity & Valuation
//!
//! A [`Vault`] is the record tracking one owner's observed asset balances,
//! reward addresses, and USD alert threshold. It is deliberately dumb:
//! the entity holds state and computes its own valuation, while every rule
//! about *when* that state may change lives in
//! [`VaultAccounting`](super::accounting::VaultAccounting).
//!
//! The valuation fold is the algorithmic heart of the crate. Everything
//! else is bookkeeping around it:
//!
//! ```text
//! value(vault, prices) = Σ amount(symbol) * price(symbol)   over vault.assets
//! ```
//!
//! with the deliberate business policy that an asset whose price the oracle
//! doesn't quote contributes `0` — a vault may legitimately hold assets
//! with a temporarily unknown price, and that is not an error.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// VaultId
// ---------------------------------------------------------------------------

/// Opaque unique identifier for a vault, assigned at creation and immutable
/// for the lifetime of the store.
///
/// Wraps a v4 UUID. Serialized as its canonical hyphenated string so the
/// wire shape stays `{"id": "…"}` rather than a byte array.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(Uuid);

impl VaultId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID. Mainly useful in tests.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultId({})", self.0)
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VaultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// One owner's treasury vault: observed balances, reward trail, threshold.
///
/// # Wire Shape
///
/// Serializes to the API's canonical JSON:
///
/// ```text
/// {id, owner, thresholdsUSD, assets: {symbol: amount},
///  rewardAddresses: [string], createdAt}
/// ```
///
/// # Thread Safety
///
/// `Vault` is plain data — concurrent access is coordinated at the storage
/// layer (per-vault `parking_lot::RwLock` inside the
/// [`VaultStore`](super::store::VaultStore)).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    /// Unique identifier, immutable after creation.
    id: VaultId,

    /// Owner reference (wallet/account string). Immutable after creation;
    /// no format validation happens here — address formats belong to
    /// whichever chain the owner lives on.
    owner: String,

    /// USD trigger value for downstream automation. Mutable only through
    /// [`VaultAccounting::update_threshold`](super::accounting::VaultAccounting::update_threshold).
    #[serde(rename = "thresholdsUSD")]
    thresholds_usd: f64,

    /// Observed balance snapshot per asset symbol. Overwrite semantics:
    /// each entry is the last balance reported, not an accumulated delta.
    assets: HashMap<String, f64>,

    /// Append-only trail of registered distribution addresses. Duplicates
    /// are permitted — this is an audit log, not a set.
    reward_addresses: Vec<String>,

    /// When this vault was created.
    created_at: DateTime<Utc>,
}

impl Vault {
    /// Constructs a fresh vault with a generated id, empty balances, and an
    /// empty reward trail. Argument validation is the accounting layer's
    /// job — by the time a `Vault` exists, its fields are legal.
    pub(crate) fn new(owner: String, thresholds_usd: f64) -> Self {
        Self {
            id: VaultId::generate(),
            owner,
            thresholds_usd,
            assets: HashMap::new(),
            reward_addresses: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the vault's unique id.
    pub fn id(&self) -> VaultId {
        self.id
    }

    /// Returns the owner reference.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the USD automation threshold.
    pub fn thresholds_usd(&self) -> f64 {
        self.thresholds_usd
    }

    /// Returns the observed balance map.
    pub fn assets(&self) -> &HashMap<String, f64> {
        &self.assets
    }

    /// Returns the reward-address trail in registration order.
    pub fn reward_addresses(&self) -> &[String] {
        &self.reward_addresses
    }

    /// Returns when this vault was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -----------------------------------------------------------------------
    // Mutators (crate-internal — all mutation goes through VaultAccounting)
    // -----------------------------------------------------------------------

    /// Records an observed balance snapshot, overwriting any previous value
    /// for the symbol. Setting the same balance twice is a no-op, which is
    /// what makes replayed on-chain deposit events safe.
    pub(crate) fn set_asset_balance(&mut self, symbol: String, amount: f64) {
        self.assets.insert(symbol, amount);
    }

    /// Appends an address to the reward trail.
    pub(crate) fn push_reward_address(&mut self, address: String) {
        self.reward_addresses.push(address);
    }

    /// Replaces the USD threshold.
    pub(crate) fn set_thresholds_usd(&mut self, thresholds_usd: f64) {
        self.thresholds_usd = thresholds_usd;
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Computes the vault's total USD value against a price map.
    ///
    /// Pure — no I/O, no mutation, result depends only on the inputs. Each
    /// held asset contributes `amount * price`, with an unquoted symbol
    /// priced at `0` via [`price_or_zero`].
    pub fn usd_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.assets
            .iter()
            .map(|(symbol, amount)| amount * price_or_zero(prices, symbol))
            .sum()
    }
}

/// Total lookup into a price map: the quoted USD price, or `0` when the
/// symbol is absent.
///
/// The zero default is intentional business policy (unknown price ≠ error),
/// not a permissive-lookup accident. Callers that need to distinguish "no
/// quote" from "cannot reach the oracle" get that distinction from the
/// oracle layer's error type, not from this function.
pub fn price_or_zero(prices: &HashMap<String, f64>, symbol: &str) -> f64 {
    prices.get(symbol).copied().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
