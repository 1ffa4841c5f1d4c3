//! Execution log entries.

use alloy_primitives::{Address, B256, Bytes};

/// A log entry emitted during transaction execution.
///
/// The address, topics, and data come from the EVM; the attribution fields
/// are filled by the state journal when the log is captured and when it is
/// read back for a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Log {
    /// Address of the contract that emitted the log.
    pub address: Address,
    /// Indexed event topics.
    pub topics: Vec<B256>,
    /// Unindexed event payload.
    pub data: Bytes,
    /// Number of the block the log was emitted in.
    pub block_number: u64,
    /// Hash of the transaction that emitted the log.
    pub tx_hash: B256,
    /// Index of that transaction within its block.
    pub tx_index: u64,
    /// Hash of the block the log was emitted in.
    pub block_hash: B256,
    /// Position of the log within the block.
    pub index: u64,
}

impl Log {
    /// Create a bare log as the EVM emits it, before journal attribution.
    pub fn new(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self { address, topics, data, ..Self::default() }
    }
}
