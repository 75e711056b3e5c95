// Copyright (c) 2026 Coffer Labs. MIT License.
// See LICENSE for details.

//! # Coffer — Treasury Vault Accounting & Valuation
//!
//! Coffer keeps the off-chain books for treasury vaults: per-owner asset
//! balance snapshots, an append-only reward-address trail, and a USD
//! threshold that downstream automation (liquidity moves, reward
//! distribution) keys off of. The on-chain contracts hold the money; this
//! library holds the truth about what they hold.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! treasury ledger:
//!
//! - **vault** — The vault entity, its identity-keyed store, and the
//!   accounting rules that are allowed to touch it.
//! - **oracle** — The price-oracle boundary: one async seam to the outside
//!   world, injected as a collaborator so tests never touch the network.
//! - **config** — Service constants and operational defaults.
//!
//! ## Design Philosophy
//!
//! 1. Validate, then mutate. A request that fails validation leaves no
//!    trace in the store.
//! 2. Every error carries a kind. "Bad input", "not found", and "upstream
//!    is down" are different problems with different fixes — collapsing
//!    them is how valuation-based automation makes expensive mistakes.
//! 3. Valuation never blocks the books. Snapshot the vault, drop the lock,
//!    then go talk to the price service.
//! 4. If it prices money, it has tests. Plural.

pub mod config;
pub mod oracle;
pub mod vault;
