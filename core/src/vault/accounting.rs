//! # Vault Accounting — Business Rules & Valuation
//!
//! Every mutation of a vault passes through [`VaultAccounting`]. The layer
//! owns three jobs:
//!
//! 1. **Validation.** Caller input is checked and normalized *before* any
//!    state is touched. An operation that fails validation leaves the
//!    store byte-for-byte unchanged.
//! 2. **Serialization per vault.** Mutations take the target vault's write
//!    lock for the duration of one operation, so concurrent writers to
//!    the same vault cannot lose each other's updates, while operations
//!    on different vaults never contend.
//! 3. **Valuation.** The one async path: snapshot the vault's assets,
//!    release every lock, fetch prices from the injected
//!    [`PriceSource`], then run the pure fold. Price-fetch latency never
//!    blocks the books.
//!
//! The accounting layer performs no retry against the oracle — if the
//! upstream is down, the caller hears about it as
//! [`AccountingError::Oracle`] and decides its own backoff policy.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config;
use crate::oracle::{OracleError, PriceSource};

use super::model::{Vault, VaultId};
use super::store::{StoreError, VaultStore};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by accounting operations.
///
/// Each variant is a distinguishable kind so the boundary layer can map it
/// to an appropriate status: bad input, missing vault, identity collision,
/// and an unreachable oracle are different problems and must not collapse
/// into one generic failure.
#[derive(Debug, Error)]
pub enum AccountingError {
    /// Malformed or missing caller input. Always client-caused; nothing
    /// was mutated.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// The offending input field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The referenced vault does not exist.
    #[error("vault not found: {0}")]
    NotFound(VaultId),

    /// Id collision on creation. Should not occur with v4 UUID generation;
    /// handled defensively and aborts the create entirely.
    #[error("duplicate vault id: {0}")]
    DuplicateId(VaultId),

    /// The price oracle failed. Propagated unchanged from the oracle layer
    /// so a caller can tell "no price quoted" (a plain `0`) apart from
    /// "could not ask".
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl From<StoreError> for AccountingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => AccountingError::DuplicateId(id),
        }
    }
}

impl AccountingError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        AccountingError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Rejects empty/blank strings and enforces a length bound. Returns the
/// input as given — normalization stops at rejection, we don't rewrite
/// caller data.
fn validate_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<String, AccountingError> {
    if value.trim().is_empty() {
        return Err(AccountingError::invalid(field, "must not be empty"));
    }
    if value.len() > max_len {
        return Err(AccountingError::invalid(
            field,
            format!("exceeds {} bytes", max_len),
        ));
    }
    Ok(value.to_string())
}

/// Rejects non-finite and negative numbers. `NaN` fails the finiteness
/// check, so it can never sneak past the comparison below.
fn validate_non_negative(field: &'static str, value: f64) -> Result<f64, AccountingError> {
    if !value.is_finite() {
        return Err(AccountingError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(AccountingError::invalid(field, "must not be negative"));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// VaultValuation
// ---------------------------------------------------------------------------

/// The result of valuing a vault against current oracle prices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultValuation {
    /// The vault that was valued.
    pub vault_id: VaultId,

    /// Total USD value: `Σ amount * price` over the vault's assets, with
    /// unquoted assets contributing 0.
    pub total_usd: f64,

    /// The vault's automation threshold at valuation time.
    #[serde(rename = "thresholdsUSD")]
    pub thresholds_usd: f64,

    /// `true` when `total_usd >= thresholds_usd` — the signal downstream
    /// automation triggers on.
    pub threshold_reached: bool,

    /// The prices actually used, keyed by asset symbol. Symbols the
    /// oracle didn't quote are absent.
    pub prices: HashMap<String, f64>,
}

// ---------------------------------------------------------------------------
// VaultAccounting
// ---------------------------------------------------------------------------

/// Business-rule layer over [`VaultStore`], consuming a [`PriceSource`].
///
/// Cheap to clone-by-`Arc` and safe to share across request handlers; all
/// interior state lives behind the store's locks.
pub struct VaultAccounting {
    store: Arc<VaultStore>,
    oracle: Arc<dyn PriceSource>,
}

impl VaultAccounting {
    /// Wires the accounting layer to its store and price source. Both are
    /// injected — there is no global lookup anywhere below this point.
    pub fn new(store: Arc<VaultStore>, oracle: Arc<dyn PriceSource>) -> Self {
        Self { store, oracle }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Creates a vault for `owner` with the given USD threshold.
    ///
    /// # Errors
    ///
    /// [`AccountingError::InvalidArgument`] if `owner` is empty/blank or
    /// over-long, or if `thresholds_usd` is negative or non-finite.
    /// [`AccountingError::DuplicateId`] on an id collision (defensive; the
    /// create is aborted entirely).
    pub fn create_vault(
        &self,
        owner: &str,
        thresholds_usd: f64,
    ) -> Result<Vault, AccountingError> {
        let owner = validate_text("owner", owner, config::MAX_OWNER_LENGTH)?;
        let thresholds_usd = validate_non_negative("thresholdsUSD", thresholds_usd)?;

        let vault = Vault::new(owner, thresholds_usd);
        let snapshot = vault.clone();
        self.store.put(vault)?;

        info!(
            vault_id = %snapshot.id(),
            owner = %snapshot.owner(),
            thresholds_usd = snapshot.thresholds_usd(),
            "vault created"
        );
        Ok(snapshot)
    }

    /// Appends a reward address to the vault's distribution trail.
    ///
    /// The trail is append-only and keeps duplicates — it is an audit log
    /// of registrations, not a set.
    ///
    /// # Errors
    ///
    /// [`AccountingError::InvalidArgument`] for an empty/blank address,
    /// [`AccountingError::NotFound`] for an unknown vault id. Either way
    /// the store is untouched.
    pub fn add_reward_address(
        &self,
        id: VaultId,
        address: &str,
    ) -> Result<Vault, AccountingError> {
        let address = validate_text("address", address, config::MAX_ADDRESS_LENGTH)?;

        let handle = self.store.handle(id).ok_or(AccountingError::NotFound(id))?;
        let mut vault = handle.write();
        vault.push_reward_address(address);

        debug!(vault_id = %id, count = vault.reward_addresses().len(), "reward address registered");
        Ok(vault.clone())
    }

    /// Records an observed asset balance snapshot.
    ///
    /// Overwrite semantics, deliberately: the caller reports the balance
    /// it observed (typically mirrored from an on-chain deposit event),
    /// not a delta, so replaying the same observation is a no-op.
    ///
    /// # Errors
    ///
    /// [`AccountingError::InvalidArgument`] for an empty symbol or a
    /// negative/non-finite amount, [`AccountingError::NotFound`] for an
    /// unknown vault id.
    pub fn record_asset_balance(
        &self,
        id: VaultId,
        symbol: &str,
        amount: f64,
    ) -> Result<Vault, AccountingError> {
        let symbol = validate_text("symbol", symbol, config::MAX_SYMBOL_LENGTH)?;
        let amount = validate_non_negative("amount", amount)?;

        let handle = self.store.handle(id).ok_or(AccountingError::NotFound(id))?;
        let mut vault = handle.write();
        vault.set_asset_balance(symbol.clone(), amount);

        debug!(vault_id = %id, symbol = %symbol, amount, "asset balance recorded");
        Ok(vault.clone())
    }

    /// Replaces the vault's USD automation threshold.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`record_asset_balance`](Self::record_asset_balance).
    pub fn update_threshold(
        &self,
        id: VaultId,
        thresholds_usd: f64,
    ) -> Result<Vault, AccountingError> {
        let thresholds_usd = validate_non_negative("thresholdsUSD", thresholds_usd)?;

        let handle = self.store.handle(id).ok_or(AccountingError::NotFound(id))?;
        let mut vault = handle.write();
        vault.set_thresholds_usd(thresholds_usd);

        info!(vault_id = %id, thresholds_usd, "threshold updated");
        Ok(vault.clone())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns a snapshot of the vault, or `None` if the id is unknown.
    pub fn get_vault(&self, id: VaultId) -> Option<Vault> {
        self.store.snapshot(id)
    }

    /// Returns snapshots of all vaults in insertion order.
    pub fn list_vaults(&self) -> Vec<Vault> {
        self.store.list()
    }

    /// Returns the number of vaults in the store.
    pub fn vault_count(&self) -> usize {
        self.store.len()
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Fetches the current USD price for a single asset id.
    ///
    /// Returns `0` when the upstream quotes nothing for the id; an
    /// unreachable upstream is an error, not a zero.
    pub async fn price_in_usd(&self, asset_id: &str) -> Result<f64, AccountingError> {
        Ok(self.oracle.fetch_price(asset_id).await?)
    }

    /// Values the vault at current oracle prices.
    ///
    /// Sequence: snapshot the vault under its read lock, release the lock,
    /// fetch prices for the held symbols, fold. No vault lock is held
    /// while the fetch is in flight, so a slow upstream never blocks
    /// other operations on this or any other vault.
    ///
    /// # Errors
    ///
    /// [`AccountingError::NotFound`] for an unknown vault id;
    /// [`AccountingError::Oracle`] when the upstream cannot be asked —
    /// propagated rather than silently valued at 0.
    pub async fn vault_usd_value(&self, id: VaultId) -> Result<VaultValuation, AccountingError> {
        let snapshot = self.store.snapshot(id).ok_or(AccountingError::NotFound(id))?;

        let mut symbols: Vec<String> = snapshot.assets().keys().cloned().collect();
        // Stable request order keeps upstream query URLs and logs
        // reproducible; HashMap iteration order is not.
        symbols.sort();

        let prices = self.oracle.fetch_prices(&symbols).await?;
        let total_usd = snapshot.usd_value(&prices);
        let thresholds_usd = snapshot.thresholds_usd();

        debug!(
            vault_id = %id,
            total_usd,
            thresholds_usd,
            quoted = prices.len(),
            held = symbols.len(),
            "vault valued"
        );

        Ok(VaultValuation {
            vault_id: id,
            total_usd,
            thresholds_usd,
            threshold_reached: total_usd >= thresholds_usd,
            prices,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StaticPriceSource;

    fn accounting() -> VaultAccounting {
        accounting_with(StaticPriceSource::default())
    }

    fn accounting_with(oracle: StaticPriceSource) -> VaultAccounting {
        VaultAccounting::new(Arc::new(VaultStore::new()), Arc::new(oracle))
    }

    // -- Creation -----------------------------------------------------------

    #[test]
    fn create_returns_empty_vault_and_stores_it() {
        let acc = accounting();
        let v = acc.create_vault("alice", 1000.0).expect("create");

        assert_eq!(v.owner(), "alice");
        assert_eq!(v.thresholds_usd(), 1000.0);
        assert!(v.assets().is_empty());
        assert!(v.reward_addresses().is_empty());

        let fetched = acc.get_vault(v.id()).expect("stored");
        assert_eq!(fetched.id(), v.id());
        assert_eq!(fetched.owner(), v.owner());
    }

    #[test]
    fn create_rejects_empty_owner() {
        let acc = accounting();
        let result = acc.create_vault("", 100.0);
        assert!(matches!(
            result,
            Err(AccountingError::InvalidArgument { field: "owner", .. })
        ));
        assert_eq!(acc.vault_count(), 0);
    }

    #[test]
    fn create_rejects_blank_owner() {
        let acc = accounting();
        assert!(acc.create_vault("   ", 100.0).is_err());
        assert_eq!(acc.vault_count(), 0);
    }

    #[test]
    fn create_rejects_negative_threshold() {
        let acc = accounting();
        let result = acc.create_vault("alice", -1.0);
        assert!(matches!(
            result,
            Err(AccountingError::InvalidArgument {
                field: "thresholdsUSD",
                ..
            })
        ));
    }

    #[test]
    fn create_rejects_non_finite_thresholds() {
        let acc = accounting();
        assert!(acc.create_vault("alice", f64::NAN).is_err());
        assert!(acc.create_vault("alice", f64::INFINITY).is_err());
        assert_eq!(acc.vault_count(), 0);
    }

    #[test]
    fn create_rejects_overlong_owner() {
        let acc = accounting();
        let owner = "x".repeat(config::MAX_OWNER_LENGTH + 1);
        assert!(acc.create_vault(&owner, 100.0).is_err());
    }

    #[test]
    fn create_accepts_zero_threshold() {
        let acc = accounting();
        let v = acc.create_vault("alice", 0.0).expect("create");
        assert_eq!(v.thresholds_usd(), 0.0);
    }

    #[test]
    fn created_ids_are_unique() {
        let acc = accounting();
        let mut ids = std::collections::HashSet::new();
        for i in 0..100 {
            let v = acc.create_vault(&format!("owner-{i}"), 1.0).expect("create");
            assert!(ids.insert(v.id()));
        }
    }

    #[test]
    fn concurrent_creates_produce_unique_ids() {
        let acc = Arc::new(accounting());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || {
                    (0..16)
                        .map(|j| {
                            acc.create_vault(&format!("o-{i}-{j}"), 1.0)
                                .expect("create")
                                .id()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for h in handles {
            for id in h.join().expect("thread") {
                assert!(ids.insert(id), "id collision across concurrent creates");
            }
        }
        assert_eq!(ids.len(), 128);
        assert_eq!(acc.vault_count(), 128);
    }

    // -- Reward addresses ---------------------------------------------------

    #[test]
    fn reward_addresses_append_in_order() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        acc.add_reward_address(id, "0xaaa").expect("first");
        let v = acc.add_reward_address(id, "0xbbb").expect("second");

        assert_eq!(v.reward_addresses(), ["0xaaa", "0xbbb"]);
    }

    #[test]
    fn reward_addresses_keep_duplicates() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        acc.add_reward_address(id, "0xaaa").unwrap();
        let v = acc.add_reward_address(id, "0xaaa").unwrap();

        assert_eq!(v.reward_addresses(), ["0xaaa", "0xaaa"]);
    }

    #[test]
    fn reward_address_rejects_blank() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        assert!(acc.add_reward_address(id, "").is_err());
        assert!(acc.add_reward_address(id, "  \t").is_err());
        // Failed validation left no trace.
        assert!(acc.get_vault(id).unwrap().reward_addresses().is_empty());
    }

    #[test]
    fn reward_address_unknown_vault_is_not_found() {
        let acc = accounting();
        let ghost = VaultId::generate();
        let result = acc.add_reward_address(ghost, "0xaaa");
        assert!(matches!(result, Err(AccountingError::NotFound(id)) if id == ghost));
        assert_eq!(acc.vault_count(), 0);
    }

    // -- Asset balances -----------------------------------------------------

    #[test]
    fn record_asset_balance_overwrites() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        acc.record_asset_balance(id, "ETH", 5.0).expect("first");
        let v = acc.record_asset_balance(id, "ETH", 3.0).expect("second");

        assert_eq!(v.assets().get("ETH"), Some(&3.0));
        assert_eq!(v.assets().len(), 1);
    }

    #[test]
    fn record_asset_balance_is_idempotent_on_replay() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        let first = acc.record_asset_balance(id, "ETH", 2.5).expect("first");
        let replay = acc.record_asset_balance(id, "ETH", 2.5).expect("replay");

        assert_eq!(first.assets(), replay.assets());
    }

    #[test]
    fn record_asset_balance_validates_input() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        assert!(acc.record_asset_balance(id, "", 1.0).is_err());
        assert!(acc.record_asset_balance(id, "ETH", -0.1).is_err());
        assert!(acc.record_asset_balance(id, "ETH", f64::NAN).is_err());
        assert!(acc.get_vault(id).unwrap().assets().is_empty());
    }

    #[test]
    fn record_asset_balance_accepts_zero() {
        let acc = accounting();
        let id = acc.create_vault("alice", 0.0).unwrap().id();
        let v = acc.record_asset_balance(id, "ETH", 0.0).expect("zero ok");
        assert_eq!(v.assets().get("ETH"), Some(&0.0));
    }

    #[test]
    fn record_asset_balance_unknown_vault_is_not_found() {
        let acc = accounting();
        let result = acc.record_asset_balance(VaultId::generate(), "ETH", 1.0);
        assert!(matches!(result, Err(AccountingError::NotFound(_))));
    }

    #[test]
    fn concurrent_symbol_updates_both_land() {
        let acc = Arc::new(accounting());
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        let a = {
            let acc = Arc::clone(&acc);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    acc.record_asset_balance(id, "ETH", 2.0).expect("eth");
                }
            })
        };
        let b = {
            let acc = Arc::clone(&acc);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    acc.record_asset_balance(id, "BTC", 1.0).expect("btc");
                }
            })
        };
        a.join().expect("thread a");
        b.join().expect("thread b");

        let v = acc.get_vault(id).expect("present");
        assert_eq!(v.assets().get("ETH"), Some(&2.0));
        assert_eq!(v.assets().get("BTC"), Some(&1.0));
    }

    // -- Threshold ----------------------------------------------------------

    #[test]
    fn update_threshold_replaces_value() {
        let acc = accounting();
        let id = acc.create_vault("alice", 100.0).unwrap().id();

        let v = acc.update_threshold(id, 2500.0).expect("update");
        assert_eq!(v.thresholds_usd(), 2500.0);
        assert_eq!(acc.get_vault(id).unwrap().thresholds_usd(), 2500.0);
    }

    #[test]
    fn update_threshold_validates() {
        let acc = accounting();
        let id = acc.create_vault("alice", 100.0).unwrap().id();

        assert!(acc.update_threshold(id, -5.0).is_err());
        assert!(acc.update_threshold(id, f64::NAN).is_err());
        assert_eq!(acc.get_vault(id).unwrap().thresholds_usd(), 100.0);
    }

    // -- Reads --------------------------------------------------------------

    #[test]
    fn list_vaults_in_creation_order() {
        let acc = accounting();
        let a = acc.create_vault("a", 0.0).unwrap().id();
        let b = acc.create_vault("b", 0.0).unwrap().id();

        let listed: Vec<VaultId> = acc.list_vaults().iter().map(|v| v.id()).collect();
        assert_eq!(listed, vec![a, b]);
    }

    // -- Valuation ----------------------------------------------------------

    #[tokio::test]
    async fn price_in_usd_delegates_to_oracle() {
        let acc = accounting_with(StaticPriceSource::default().with_price("ethereum", 1800.0));

        assert_eq!(acc.price_in_usd("ethereum").await.unwrap(), 1800.0);
        assert_eq!(acc.price_in_usd("unlisted").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn valuation_folds_prices_and_flags_threshold() {
        let acc = accounting_with(
            StaticPriceSource::default()
                .with_price("ETH", 2000.0)
                .with_price("BTC", 40_000.0),
        );
        let id = acc.create_vault("alice", 50_000.0).unwrap().id();
        acc.record_asset_balance(id, "ETH", 2.0).unwrap();
        acc.record_asset_balance(id, "BTC", 1.5).unwrap();

        let valuation = acc.vault_usd_value(id).await.expect("valued");
        assert_eq!(valuation.total_usd, 64_000.0);
        assert_eq!(valuation.thresholds_usd, 50_000.0);
        assert!(valuation.threshold_reached);
        assert_eq!(valuation.prices.len(), 2);
    }

    #[tokio::test]
    async fn valuation_prices_unquoted_assets_at_zero() {
        let acc = accounting_with(StaticPriceSource::default().with_price("ETH", 2000.0));
        let id = acc.create_vault("alice", 10_000.0).unwrap().id();
        acc.record_asset_balance(id, "ETH", 2.0).unwrap();
        acc.record_asset_balance(id, "BTC", 1.0).unwrap();

        let valuation = acc.vault_usd_value(id).await.expect("valued");
        assert_eq!(valuation.total_usd, 4000.0);
        assert!(!valuation.threshold_reached);
        assert!(!valuation.prices.contains_key("BTC"));
    }

    #[tokio::test]
    async fn valuation_of_empty_vault_is_zero() {
        let acc = accounting_with(StaticPriceSource::default().with_price("ETH", 2000.0));
        let id = acc.create_vault("alice", 0.0).unwrap().id();

        let valuation = acc.vault_usd_value(id).await.expect("valued");
        assert_eq!(valuation.total_usd, 0.0);
        // Inclusive comparison: zero value meets a zero threshold.
        assert!(valuation.threshold_reached);
    }

    #[tokio::test]
    async fn valuation_unknown_vault_is_not_found() {
        let acc = accounting();
        let result = acc.vault_usd_value(VaultId::generate()).await;
        assert!(matches!(result, Err(AccountingError::NotFound(_))));
    }

    #[tokio::test]
    async fn valuation_wire_shape() {
        let acc = accounting_with(StaticPriceSource::default().with_price("ETH", 1800.0));
        let id = acc.create_vault("alice", 1000.0).unwrap().id();
        acc.record_asset_balance(id, "ETH", 2.0).unwrap();

        let valuation = acc.vault_usd_value(id).await.expect("valued");
        let json = serde_json::to_value(&valuation).expect("serialize");

        assert_eq!(json["vaultId"], id.to_string());
        assert_eq!(json["totalUsd"], 3600.0);
        assert_eq!(json["thresholdsUSD"], 1000.0);
        assert_eq!(json["thresholdReached"], true);
        assert_eq!(json["prices"]["ETH"], 1800.0);
    }
}
