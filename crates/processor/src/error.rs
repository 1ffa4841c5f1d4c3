//! Processor error types.

use alloy_primitives::B256;
use ember_primitives::TransactionError;
use thiserror::Error;

use crate::{EngineError, EvmError};

/// Failure applying a single transaction.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The transaction could not be converted to an executable message.
    #[error("message conversion: {0}")]
    Message(#[from] TransactionError),

    /// Message execution failed at the consensus level.
    #[error(transparent)]
    Evm(#[from] EvmError),
}

/// A block could not be processed. No partial output is exposed.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The consensus engine rejected the block.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A sender could not be recovered during dispatch.
    #[error(transparent)]
    Sender(#[from] TransactionError),

    /// A transaction failed to apply.
    #[error("could not apply tx {index} [{tx_hash}]: {source}")]
    Apply {
        /// Position of the transaction in the block.
        index: usize,
        /// Hash of the failing transaction.
        tx_hash: B256,
        /// Underlying failure.
        #[source]
        source: ApplyError,
    },

    /// An X402 transaction carried an undecodable payload.
    #[error("invalid x402 payload for tx {tx_hash}: {source}")]
    X402Payload {
        /// Hash of the malformed transaction.
        tx_hash: B256,
        /// Codec error.
        #[source]
        source: alloy_rlp::Error,
    },
}
