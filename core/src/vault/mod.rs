//! # Vault Module — Entity, Store & Accounting
//!
//! Everything a treasury vault is and everything that may happen to one.
//! If the oracle module is how Coffer sees the world, the vault module is
//! what it knows about it — the books themselves.
//!
//! ## Architecture
//!
//! ```text
//! model.rs      — Vault entity, VaultId, the pure valuation fold
//! store.rs      — identity-keyed registry with per-vault locking
//! accounting.rs — business rules: creation, mutation, valuation
//! ```
//!
//! ## Design Principles
//!
//! 1. **The store owns every vault.** Callers get snapshots; mutation
//!    goes through [`VaultAccounting`] or not at all.
//!
//! 2. **Balances are observations, not deltas.** `recordAssetBalance`
//!    overwrites — it mirrors what an on-chain event said the balance
//!    *is*, which makes replays harmless.
//!
//! 3. **Valuation is a pure fold.** Prices in, number out. The async
//!    price fetch happens before the fold, with no lock held.

pub mod accounting;
pub mod model;
pub mod store;

pub use accounting::{AccountingError, VaultAccounting, VaultValuation};
pub use model::{price_or_zero, Vault, VaultId};
pub use store::{StoreError, VaultStore};
