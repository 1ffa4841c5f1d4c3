//! Block container.

use alloy_consensus::Header;
use alloy_primitives::B256;

use crate::Transaction;

/// A block as handed to the state processor: a header, the ordered
/// transaction list, and the uncle headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Block header.
    pub header: Header,
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
    /// Uncle headers referenced by the block.
    pub uncles: Vec<Header>,
}

impl Block {
    /// Create a block from a header and its transactions.
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions, uncles: Vec::new() }
    }

    /// Block hash.
    pub fn hash(&self) -> B256 {
        self.header.hash_slow()
    }

    /// Block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// Gas limit of the block.
    pub const fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }
}
