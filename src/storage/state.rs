//! Ledger persistence.
//!
//! Each record type lives under its own key prefix so a single depositor or
//! vessel can be read without decoding the whole pool:
//!
//! - `meta:ledger` - configuration, balances and the list of assets
//! - `book:<asset>` - clock and liquidation counters
//! - `pool:<asset>` - pool header (P, scale, epoch, S, G, issuance)
//! - `dep:<asset><depositor>` - depositor record
//! - `vsl:<asset><owner>` - vessel

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::core::config::LedgerConfig;
use crate::core::vessel::{Vessel, VesselManager};
use crate::error::{Error, Result};
use crate::liquidation::stability_pool::{Depositor, PoolHeader, StabilityPool};
use crate::protocol::ledger::{Accounts, AssetBook, BookMeta, Ledger};
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::constants::ADDRESS_LENGTH;
use crate::utils::crypto::{Address, AssetId, Hash};

/// Layout version written with every save
pub const STATE_VERSION: u32 = 1;

const LEDGER_KEY: &[u8] = b"ledger";
const BOOK: &[u8] = b"book:";

/// Ledger-wide record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMeta {
    /// Layout version
    pub version: u32,
    /// Configuration the ledger ran with
    pub config: LedgerConfig,
    /// Shared balances
    pub accounts: Accounts,
    /// Registered assets
    pub assets: Vec<AssetId>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Saves and loads a [`Ledger`] through any storage backend
pub struct LedgerStore<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> LedgerStore<B> {
    /// Wrap a backend
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    /// Write the full ledger and flush
    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        let assets = ledger.assets()?;
        for asset in &assets {
            ledger.inspect(asset, |book| self.save_book(book))??;
        }

        let meta = LedgerMeta {
            version: STATE_VERSION,
            config: ledger.config().clone(),
            accounts: ledger.accounts()?,
            assets,
        };
        self.store.set(&make_key(prefixes::META, &[LEDGER_KEY]), &meta)?;
        self.store.flush()?;

        info!(assets = meta.assets.len(), "ledger saved");
        Ok(())
    }

    /// Load a previously saved ledger, if any
    pub fn load(&self) -> Result<Option<Ledger>> {
        let Some(meta) = self.store.get::<LedgerMeta>(&make_key(prefixes::META, &[LEDGER_KEY]))? else {
            return Ok(None);
        };
        if meta.version != STATE_VERSION {
            return Err(Error::Storage(format!(
                "unsupported state version {} (expected {})",
                meta.version, STATE_VERSION
            )));
        }

        let books = meta
            .assets
            .iter()
            .map(|asset| self.load_book(asset))
            .collect::<Result<Vec<_>>>()?;

        info!(assets = books.len(), "ledger loaded");
        Ok(Some(Ledger::from_parts(meta.config, meta.accounts, books)))
    }

    /// Load one depositor record without touching the rest of the pool
    pub fn load_depositor(&self, asset: &AssetId, depositor: &Address) -> Result<Option<Depositor>> {
        self.store
            .get(&make_key(prefixes::DEPOSITOR, &[asset.as_bytes(), depositor.as_bytes()]))
    }

    /// Load one vessel
    pub fn load_vessel(&self, asset: &AssetId, owner: &Address) -> Result<Option<Vessel>> {
        self.store
            .get(&make_key(prefixes::VESSEL, &[asset.as_bytes(), owner.as_bytes()]))
    }

    /// Hash over every stored record in key order
    pub fn state_root(&self) -> Result<Hash> {
        let mut bytes = Vec::new();
        for key in self.store.backend().list_prefix(b"")? {
            if let Some(value) = self.store.backend().get(&key)? {
                bytes.extend_from_slice(&key);
                bytes.extend_from_slice(&value);
            }
        }
        Ok(Hash::sha256(&bytes))
    }

    /// Get the underlying typed store
    pub fn store(&self) -> &TypedStore<B> {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn save_book(&self, book: &AssetBook) -> Result<()> {
        let asset = book.asset();
        let id = asset.as_bytes();

        self.store.set(&make_key(BOOK, &[id]), &book.meta())?;
        self.store.set(&make_key(prefixes::POOL, &[id]), book.pool().header())?;

        // Records removed since the last save must not come back on load
        self.store.delete_prefix(&make_key(prefixes::DEPOSITOR, &[id]))?;
        for (depositor, record) in book.pool().depositors() {
            self.store
                .set(&make_key(prefixes::DEPOSITOR, &[id, depositor.as_bytes()]), record)?;
        }

        self.store.delete_prefix(&make_key(prefixes::VESSEL, &[id]))?;
        for vessel in book.vessels().iter() {
            self.store
                .set(&make_key(prefixes::VESSEL, &[id, vessel.owner.as_bytes()]), vessel)?;
        }
        Ok(())
    }

    fn load_book(&self, asset: &AssetId) -> Result<AssetBook> {
        let id = asset.as_bytes();
        let missing = |what: &str| Error::Storage(format!("{} missing for asset {}", what, asset));

        let meta: BookMeta = self.store.get(&make_key(BOOK, &[id]))?.ok_or_else(|| missing("book"))?;
        let header: PoolHeader = self
            .store
            .get(&make_key(prefixes::POOL, &[id]))?
            .ok_or_else(|| missing("pool header"))?;

        let prefix = make_key(prefixes::DEPOSITOR, &[id]);
        let mut depositors = BTreeMap::new();
        for (key, record) in self.store.scan::<Depositor>(&prefix)? {
            depositors.insert(address_suffix(&key)?, record);
        }

        let mut vessels = VesselManager::new();
        for (_, vessel) in self.store.scan::<Vessel>(&make_key(prefixes::VESSEL, &[id]))? {
            vessels.upsert(vessel);
        }

        let pool = StabilityPool::from_parts(header, depositors);
        Ok(AssetBook::from_parts(pool, vessels, meta))
    }
}

fn address_suffix(key: &[u8]) -> Result<Address> {
    let start = key
        .len()
        .checked_sub(ADDRESS_LENGTH)
        .ok_or_else(|| Error::Storage(format!("malformed key {}", hex::encode(key))))?;
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&key[start..]);
    Ok(Address::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::TokenAmount;
    use crate::storage::backend::{FileStore, InMemoryStore};

    fn weth() -> AssetId {
        Address::from_label("weth")
    }

    fn tokens(n: u64) -> TokenAmount {
        TokenAmount::from_tokens(n)
    }

    fn populated_ledger() -> Ledger {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        ledger.register_asset(weth(), 0).unwrap();
        let alice = Address::from_label("alice");
        ledger.open_vessel(weth(), alice, tokens(10), tokens(1_000), None, 0).unwrap();
        ledger.provide_to_sp(weth(), alice, tokens(500), 0).unwrap();
        ledger
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = LedgerStore::new(InMemoryStore::new());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let ledger = populated_ledger();
        let store = LedgerStore::new(InMemoryStore::new());
        store.save(&ledger).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.assets().unwrap(), vec![weth()]);
        assert_eq!(
            loaded.pool_state_hash(&weth()).unwrap(),
            ledger.pool_state_hash(&weth()).unwrap()
        );
        assert_eq!(
            loaded.debt_balance(&Address::from_label("alice")).unwrap(),
            tokens(500)
        );
        loaded.verify_invariants().unwrap();
    }

    #[test]
    fn test_records_are_stored_separately() {
        let ledger = populated_ledger();
        let store = LedgerStore::new(InMemoryStore::new());
        store.save(&ledger).unwrap();

        let alice = Address::from_label("alice");
        let record = store.load_depositor(&weth(), &alice).unwrap().unwrap();
        assert_eq!(record.initial_deposit, tokens(500));

        let vessel = store.load_vessel(&weth(), &alice).unwrap().unwrap();
        assert_eq!(vessel.principal_debt, tokens(1_000));
    }

    #[test]
    fn test_removed_depositor_is_not_restored() {
        let ledger = populated_ledger();
        let store = LedgerStore::new(InMemoryStore::new());
        store.save(&ledger).unwrap();

        let alice = Address::from_label("alice");
        ledger.withdraw_from_sp(weth(), alice, tokens(500), 10).unwrap();
        store.save(&ledger).unwrap();

        assert!(store.load_depositor(&weth(), &alice).unwrap().is_none());
        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.compounded_deposit(&weth(), &alice).unwrap().is_zero());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = populated_ledger();

        LedgerStore::new(FileStore::open(dir.path()).unwrap()).save(&ledger).unwrap();
        let loaded = LedgerStore::new(FileStore::open(dir.path()).unwrap())
            .load()
            .unwrap()
            .unwrap();

        assert_eq!(
            loaded.pool_statistics(&weth()).unwrap().total_deposits,
            tokens(500)
        );
    }

    #[test]
    fn test_state_root_changes_with_state() {
        let ledger = populated_ledger();
        let store = LedgerStore::new(InMemoryStore::new());
        store.save(&ledger).unwrap();
        let before = store.state_root().unwrap();

        ledger.trigger_issuance(weth(), 600).unwrap();
        ledger.borrow(weth(), Address::from_label("alice"), tokens(1), 600).unwrap();
        store.save(&ledger).unwrap();

        assert_ne!(store.state_root().unwrap(), before);
    }
}
