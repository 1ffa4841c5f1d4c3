//! Consensus-engine seams.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use ember_primitives::{Header, Receipt, Transaction};
use ember_state::StateDb;
use thiserror::Error;

/// Read-only chain access handed to the EVM block environment and the
/// engine. Opaque to the processor beyond hash lookups.
pub trait ChainContext: Send + Sync {
    /// Hash of the canonical block at `number`, when known.
    fn block_hash(&self, number: u64) -> Option<B256>;
}

/// Address-screening hook an engine can attach to the EVM block
/// environment.
pub trait ExtraValidator: Send + Sync {
    /// Whether `address` is barred from participating at this block.
    fn is_address_denied(&self, address: Address) -> bool;
}

/// Failure reported by the consensus engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Block pre-handling failed.
    #[error("pre-handle: {0}")]
    PreHandle(String),

    /// A transaction could not be classified as system or common.
    #[error("system transaction classification: {0}")]
    SystemTransaction(String),

    /// A transaction failed engine validation.
    #[error("transaction validation: {0}")]
    InvalidTransaction(String),

    /// Block finalization failed.
    #[error("finalize: {0}")]
    Finalize(String),
}

/// The consensus engine as the processor drives it.
pub trait ConsensusEngine<S: StateDb> {
    /// Apply engine-specific block finalization: rewards, uncle
    /// accounting, and execution of the deferred system transactions.
    /// Receives the executed (common) transactions and their receipts for
    /// in-place amendment.
    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        chain: &dyn ChainContext,
        header: &Header,
        state: &mut S,
        common_txs: &mut Vec<Transaction>,
        uncles: &[Header],
        receipts: &mut Vec<Receipt>,
        system_txs: Vec<Transaction>,
    ) -> Result<(), EngineError>;

    /// The engine's proof-of-staked-authority extension, when it has one.
    /// Queried once per processed block, never inside the dispatch loop.
    fn posa(&self) -> Option<&dyn Posa<S>> {
        None
    }
}

/// Proof-of-staked-authority capability of a consensus engine.
pub trait Posa<S: StateDb> {
    /// Run engine bookkeeping before any transaction executes.
    fn pre_handle(
        &self,
        chain: &dyn ChainContext,
        header: &Header,
        state: &mut S,
    ) -> Result<(), EngineError>;

    /// Validation hook to attach to the EVM block environment, if any.
    fn extra_validator(&self, header: &Header, state: &S) -> Option<Arc<dyn ExtraValidator>>;

    /// Whether `tx` is a system transaction the engine executes itself
    /// during [`ConsensusEngine::finalize`].
    fn is_system_transaction(
        &self,
        sender: Address,
        tx: &Transaction,
        header: &Header,
    ) -> Result<bool, EngineError>;

    /// Engine-level validation of a common transaction before execution.
    fn validate_tx(
        &self,
        sender: Address,
        tx: &Transaction,
        header: &Header,
        state: &S,
    ) -> Result<(), EngineError>;
}
