//! # Vault Store
//!
//! Identity-keyed storage for vaults. The store owns every [`Vault`]
//! instance for the process lifetime: callers get snapshots (clones) for
//! reading, and all mutation goes through the accounting layer, which
//! holds the per-vault write lock for the duration of a single operation.
//!
//! ## Locking Model
//!
//! Two layers, never held across I/O:
//!
//! - A sharded [`DashMap`] keyed by [`VaultId`] resolves ids to vaults
//!   without a store-wide writer bottleneck; operations on different vault
//!   ids are fully independent.
//! - Each vault sits behind its own `parking_lot::RwLock`, which serializes
//!   writers per vault id and gives readers a consistent snapshot — a
//!   reader can never observe a half-applied balance update.
//!
//! The insertion-order index is a separate `RwLock<Vec<VaultId>>`. It is
//! only touched after a map insert completes, so the two locks are never
//! held simultaneously and cannot deadlock against readers.
//!
//! The store is constructed once at process start and never implicitly
//! reset. Swapping in a durable backend means replacing this type behind
//! the same method surface — the accounting layer's contract does not
//! change.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;

use super::model::{Vault, VaultId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur at the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert collided with an existing vault id. With v4 UUID
    /// generation this should never occur; it is surfaced rather than
    /// swallowed so a misbehaving id source is caught, not papered over.
    #[error("duplicate vault id: {0}")]
    DuplicateId(VaultId),
}

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// In-memory vault registry with per-vault lock granularity.
pub struct VaultStore {
    /// Vaults keyed by id. Values are shared handles so a mutation can
    /// lock one vault without touching the map shard for the whole
    /// critical section.
    vaults: DashMap<VaultId, Arc<RwLock<Vault>>>,

    /// Ids in insertion order, for stable `list()` output.
    insertion_order: RwLock<Vec<VaultId>>,
}

impl VaultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            vaults: DashMap::new(),
            insertion_order: RwLock::new(Vec::new()),
        }
    }

    /// Inserts a new vault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if a vault with the same id
    /// already exists; the store is left unchanged.
    pub fn put(&self, vault: Vault) -> Result<(), StoreError> {
        let id = vault.id();
        match self.vaults.entry(id) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(vault)));
            }
        }
        // The entry guard is released before the order index is touched,
        // so no thread ever holds both locks at once.
        self.insertion_order.write().push(id);
        Ok(())
    }

    /// Returns a snapshot of the vault, or `None` if the id is unknown.
    ///
    /// Absence is an explicit `None`, not an error — callers distinguish
    /// "not found" from system failure.
    pub fn snapshot(&self, id: VaultId) -> Option<Vault> {
        self.vaults.get(&id).map(|entry| entry.value().read().clone())
    }

    /// Returns `true` if a vault with the given id exists.
    pub fn contains(&self, id: VaultId) -> bool {
        self.vaults.contains_key(&id)
    }

    /// Returns snapshots of all vaults in insertion order.
    ///
    /// The order is stable for sequential use; under concurrent creation
    /// the relative order of racing inserts is whatever order they won the
    /// index lock in.
    pub fn list(&self) -> Vec<Vault> {
        let ids: Vec<VaultId> = self.insertion_order.read().clone();
        ids.into_iter()
            .filter_map(|id| self.snapshot(id))
            .collect()
    }

    /// Returns the number of stored vaults.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    /// Returns `true` if the store holds no vaults.
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Returns the shared handle for a vault, for accounting-layer
    /// mutation under the per-vault write lock. Crate-internal: handing
    /// out handles publicly would let callers mutate around the
    /// accounting rules.
    pub(crate) fn handle(&self, id: VaultId) -> Option<Arc<RwLock<Vault>>> {
        self.vaults.get(&id).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for VaultStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(owner: &str) -> Vault {
        Vault::new(owner.into(), 100.0)
    }

    #[test]
    fn put_then_snapshot_roundtrip() {
        let store = VaultStore::new();
        let v = vault("alice");
        let id = v.id();

        store.put(v).expect("insert");
        let got = store.snapshot(id).expect("present");
        assert_eq!(got.id(), id);
        assert_eq!(got.owner(), "alice");
    }

    #[test]
    fn snapshot_unknown_id_is_none() {
        let store = VaultStore::new();
        assert!(store.snapshot(VaultId::generate()).is_none());
        assert!(!store.contains(VaultId::generate()));
    }

    #[test]
    fn duplicate_id_rejected_and_store_unchanged() {
        let store = VaultStore::new();
        let v = vault("alice");
        let id = v.id();
        store.put(v.clone()).expect("first insert");

        let mut imposter = v;
        imposter.set_asset_balance("ETH".into(), 99.0);
        let result = store.put(imposter);

        assert!(matches!(result, Err(StoreError::DuplicateId(d)) if d == id));
        assert_eq!(store.len(), 1);
        // Original contents untouched by the failed insert.
        assert!(store.snapshot(id).unwrap().assets().is_empty());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let store = VaultStore::new();
        let ids: Vec<VaultId> = ["a", "b", "c"]
            .iter()
            .map(|owner| {
                let v = vault(owner);
                let id = v.id();
                store.put(v).expect("insert");
                id
            })
            .collect();

        let listed: Vec<VaultId> = store.list().iter().map(|v| v.id()).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let store = VaultStore::new();
        let v = vault("alice");
        let id = v.id();
        store.put(v).expect("insert");

        let before = store.snapshot(id).expect("present");
        store
            .handle(id)
            .expect("handle")
            .write()
            .set_asset_balance("ETH".into(), 2.0);

        assert!(before.assets().is_empty());
        assert_eq!(store.snapshot(id).unwrap().assets().get("ETH"), Some(&2.0));
    }

    #[test]
    fn concurrent_inserts_all_land() {
        let store = Arc::new(VaultStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..16 {
                        store.put(vault(&format!("owner-{i}-{j}"))).expect("insert");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        assert_eq!(store.len(), 128);
        assert_eq!(store.list().len(), 128);
    }

    #[test]
    fn concurrent_writers_to_one_vault_lose_nothing() {
        let store = Arc::new(VaultStore::new());
        let v = vault("alice");
        let id = v.id();
        store.put(v).expect("insert");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let handle = store.handle(id).expect("handle");
                    handle.write().set_asset_balance(format!("SYM{i}"), i as f64);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        let snap = store.snapshot(id).expect("present");
        assert_eq!(snap.assets().len(), 8);
        for i in 0..8 {
            assert_eq!(snap.assets().get(&format!("SYM{i}")), Some(&(i as f64)));
        }
    }
}
