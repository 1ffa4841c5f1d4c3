//! Transaction receipts and log blooms.

use alloy_primitives::{Address, B256, Bloom, BloomInput};

use crate::{Log, TxType};

/// Execution status recorded in a receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiptStatus {
    /// The transaction reverted, halted, or failed settlement.
    Failed = 0,
    /// The transaction executed successfully.
    Successful = 1,
}

impl ReceiptStatus {
    /// Status from an execution success flag.
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Successful } else { Self::Failed }
    }

    /// Whether the receipt records a success.
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::Successful)
    }
}

/// The result of executing one transaction within a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Type tag of the originating transaction.
    pub tx_type: TxType,
    /// Intermediate state root; only populated before Byzantium.
    pub post_state: Option<B256>,
    /// Execution status.
    pub status: ReceiptStatus,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom filter over this receipt's logs.
    pub bloom: Bloom,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
    /// Hash of the originating transaction.
    pub tx_hash: B256,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Hash of the enclosing block.
    pub block_hash: B256,
    /// Number of the enclosing block.
    pub block_number: u64,
    /// Position of the transaction within the block.
    pub transaction_index: u64,
}

/// Bloom filter over the addresses and topics of `logs`.
pub fn logs_bloom(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_slice()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic.as_slice()));
        }
    }
    bloom
}
