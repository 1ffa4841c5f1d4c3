//! Sender recovery.

use alloy_primitives::Address;

use crate::{ChainConfig, Transaction, TransactionError};

/// Recovers transaction senders for a specific chain.
///
/// The signer is derived from the chain configuration at a block number so
/// that future signature-scheme forks can swap the recovery rules without
/// touching call sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signer {
    chain_id: u64,
}

impl Signer {
    /// Signer for a fixed chain id.
    pub const fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// Signer in effect at `number` under `config`.
    pub const fn for_block(config: &ChainConfig, _number: u64) -> Self {
        Self::new(config.chain_id)
    }

    /// The chain id signatures are checked against.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Recover the sender address of `tx`.
    ///
    /// Transactions bound to another chain are rejected before any curve
    /// work. X402 envelopes have no recoverable envelope sender; their
    /// payer is authenticated by the payload signature during settlement.
    pub fn recover(&self, tx: &Transaction) -> Result<Address, TransactionError> {
        match tx {
            Transaction::Legacy(signed) => {
                if let Some(tx_chain) = signed.tx().chain_id
                    && tx_chain != self.chain_id
                {
                    return Err(TransactionError::ChainIdMismatch {
                        tx: tx_chain,
                        signer: self.chain_id,
                    });
                }
                Ok(signed.recover_signer()?)
            }
            Transaction::DynamicFee(signed) => {
                let tx_chain = signed.tx().chain_id;
                if tx_chain != self.chain_id {
                    return Err(TransactionError::ChainIdMismatch {
                        tx: tx_chain,
                        signer: self.chain_id,
                    });
                }
                Ok(signed.recover_signer()?)
            }
            Transaction::X402(_) => Err(TransactionError::NotExecutable),
        }
    }
}
