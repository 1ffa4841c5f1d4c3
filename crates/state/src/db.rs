//! World-state interface consumed by the block processor.

use alloy_primitives::{Address, B256, U256};
use ember_primitives::{Block, Log, Signer};

/// Mutable world state under block execution.
///
/// The processor drives exactly this surface: balance arithmetic for
/// native transfers, raw storage slots for the replay registry, a
/// per-transaction log journal keyed by [`prepare`](Self::prepare), and
/// the two commitment modes the fork rules choose between after every
/// transaction.
pub trait StateDb {
    /// Warm the accounts a block will touch. Backends without a cold
    /// store can leave this as the default no-op.
    fn preload_accounts(&mut self, _block: &Block, _signer: &Signer) {}

    /// Bind subsequent log captures to a transaction.
    fn prepare(&mut self, tx_hash: B256, tx_index: u64);

    /// Index of the transaction bound by the last [`prepare`](Self::prepare).
    fn tx_index(&self) -> u64;

    /// Balance of `address`; zero for absent accounts.
    fn balance(&self, address: Address) -> U256;

    /// Credit `address` by `amount`.
    fn add_balance(&mut self, address: Address, amount: U256);

    /// Debit `address` by `amount`.
    fn sub_balance(&mut self, address: Address, amount: U256);

    /// Read the storage slot `key` of `address`; zero when unset.
    fn storage(&self, address: Address, key: B256) -> B256;

    /// Write the storage slot `key` of `address`.
    fn set_storage(&mut self, address: Address, key: B256, value: B256);

    /// Journal a log under the transaction bound by
    /// [`prepare`](Self::prepare).
    fn add_log(&mut self, log: Log);

    /// Logs journaled for `tx_hash`, attributed to `block_hash`.
    fn logs(&self, tx_hash: B256, block_hash: B256) -> Vec<Log>;

    /// Settle pending changes without producing a root (post-Byzantium
    /// commitment). `delete_empty` applies EIP-158 empty-account removal.
    fn finalise(&mut self, delete_empty: bool);

    /// Settle pending changes and return the intermediate state root
    /// (pre-Byzantium commitment).
    fn intermediate_root(&mut self, delete_empty: bool) -> B256;
}
