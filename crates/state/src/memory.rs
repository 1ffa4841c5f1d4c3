//! Deterministic in-memory state backend.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, B256, U256, keccak256};
use ember_primitives::Log;

use crate::StateDb;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Account {
    balance: U256,
    nonce: u64,
}

impl Account {
    fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0
    }
}

/// In-memory [`StateDb`] implementation.
///
/// Backs the processor's tests and any consumer that does not need a trie.
/// `intermediate_root` hashes the sorted account and storage contents, so
/// equal states always produce equal roots. An account with live storage
/// is never considered empty: pseudo-accounts such as the payment replay
/// registry must survive empty-account deletion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryState {
    accounts: BTreeMap<Address, Account>,
    storage: BTreeMap<Address, BTreeMap<B256, B256>>,
    logs: BTreeMap<B256, Vec<Log>>,
    touched: BTreeSet<Address>,
    tx_hash: B256,
    tx_index: u64,
    log_count: u64,
}

impl MemoryState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an account balance directly. Genesis/test setup only.
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.accounts.entry(address).or_default().balance = balance;
    }

    /// Set an account nonce directly. Genesis/test setup only.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.accounts.entry(address).or_default().nonce = nonce;
    }

    fn delete_empty_accounts(&mut self) {
        let touched = std::mem::take(&mut self.touched);
        for address in touched {
            let has_storage =
                self.storage.get(&address).is_some_and(|slots| !slots.is_empty());
            if has_storage {
                continue;
            }
            if self.accounts.get(&address).is_some_and(Account::is_empty) {
                self.accounts.remove(&address);
                self.storage.remove(&address);
            }
        }
    }
}

impl StateDb for MemoryState {
    fn prepare(&mut self, tx_hash: B256, tx_index: u64) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    fn tx_index(&self) -> u64 {
        self.tx_index
    }

    fn balance(&self, address: Address) -> U256 {
        self.accounts.get(&address).map(|account| account.balance).unwrap_or_default()
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
        self.touched.insert(address);
    }

    fn sub_balance(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_sub(amount);
        self.touched.insert(address);
    }

    fn storage(&self, address: Address, key: B256) -> B256 {
        self.storage
            .get(&address)
            .and_then(|slots| slots.get(&key))
            .copied()
            .unwrap_or_default()
    }

    fn set_storage(&mut self, address: Address, key: B256, value: B256) {
        let slots = self.storage.entry(address).or_default();
        if value.is_zero() {
            slots.remove(&key);
        } else {
            slots.insert(key, value);
        }
        self.touched.insert(address);
    }

    fn add_log(&mut self, mut log: Log) {
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index;
        log.index = self.log_count;
        self.log_count += 1;
        self.logs.entry(self.tx_hash).or_default().push(log);
    }

    fn logs(&self, tx_hash: B256, block_hash: B256) -> Vec<Log> {
        let mut logs = self.logs.get(&tx_hash).cloned().unwrap_or_default();
        for log in &mut logs {
            log.block_hash = block_hash;
        }
        logs
    }

    fn finalise(&mut self, delete_empty: bool) {
        if delete_empty {
            self.delete_empty_accounts();
        } else {
            self.touched.clear();
        }
    }

    fn intermediate_root(&mut self, delete_empty: bool) -> B256 {
        self.finalise(delete_empty);

        let mut preimage = Vec::new();
        for (address, account) in &self.accounts {
            preimage.extend_from_slice(address.as_slice());
            preimage.extend_from_slice(&account.balance.to_be_bytes::<32>());
            preimage.extend_from_slice(&account.nonce.to_be_bytes());
        }
        for (address, slots) in &self.storage {
            if slots.is_empty() {
                continue;
            }
            preimage.extend_from_slice(address.as_slice());
            for (key, value) in slots {
                preimage.extend_from_slice(key.as_slice());
                preimage.extend_from_slice(value.as_slice());
            }
        }
        keccak256(&preimage)
    }
}
