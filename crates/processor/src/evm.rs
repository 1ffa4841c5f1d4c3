//! The seam between the processor and the EVM interpreter.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use ember_primitives::{Header, Message};
use ember_state::StateDb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChainContext, ExtraValidator, GasPool, GasPoolError};

/// Interpreter toggles forwarded to the EVM factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmConfig {
    /// Skip base-fee enforcement when executing messages.
    #[serde(default)]
    pub no_base_fee: bool,
    /// Record an execution trace for every message.
    #[serde(default)]
    pub trace: bool,
}

/// Per-transaction EVM context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxContext {
    /// Transaction origin (`tx.origin`).
    pub origin: Address,
    /// Effective gas price exposed to `GASPRICE`.
    pub gas_price: U256,
}

/// Per-block EVM environment, derived from the header.
#[derive(Clone)]
pub struct BlockContext {
    /// Block number.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee, when the chain prices gas dynamically.
    pub base_fee: Option<u64>,
    /// Fee recipient.
    pub beneficiary: Address,
    /// Chain access for `BLOCKHASH`.
    pub chain: Arc<dyn ChainContext>,
    /// Engine-attached validation hook, when the engine provides one.
    pub extra_validator: Option<Arc<dyn ExtraValidator>>,
}

impl BlockContext {
    /// Environment for `header`. `author` overrides the header
    /// beneficiary when a miner processes its own pending block.
    pub fn new(header: &Header, chain: Arc<dyn ChainContext>, author: Option<Address>) -> Self {
        Self {
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            base_fee: header.base_fee_per_gas,
            beneficiary: author.unwrap_or(header.beneficiary),
            chain,
            extra_validator: None,
        }
    }
}

impl fmt::Debug for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockContext")
            .field("number", &self.number)
            .field("timestamp", &self.timestamp)
            .field("gas_limit", &self.gas_limit)
            .field("base_fee", &self.base_fee)
            .field("beneficiary", &self.beneficiary)
            .finish_non_exhaustive()
    }
}

/// Outcome of executing a message to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Execution ran to completion.
    Success {
        /// Gas consumed.
        gas_used: u64,
        /// Return data.
        output: Bytes,
    },
    /// Execution reverted, consuming only the gas spent so far.
    Revert {
        /// Gas consumed.
        gas_used: u64,
        /// Revert data.
        output: Bytes,
    },
    /// Execution halted (out of gas, invalid opcode, …), consuming the
    /// entire budget.
    Halt {
        /// Gas consumed.
        gas_used: u64,
        /// Halt description.
        reason: String,
    },
}

impl ExecutionResult {
    /// Gas consumed by the execution.
    pub const fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. }
            | Self::Revert { gas_used, .. }
            | Self::Halt { gas_used, .. } => *gas_used,
        }
    }

    /// Whether execution ran to completion.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Description of the in-EVM failure, if any.
    pub fn vm_error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Revert { .. } => Some("execution reverted"),
            Self::Halt { reason, .. } => Some(reason),
        }
    }
}

/// Consensus-fatal failure executing a message.
///
/// Distinct from a transaction that merely reverts: a revert still yields
/// a (failed) receipt, while these errors invalidate the whole block.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvmError {
    /// The message nonce does not match the sender's account nonce.
    #[error("nonce mismatch for {address}: tx {tx_nonce}, state {state_nonce}")]
    NonceMismatch {
        /// Sender account.
        address: Address,
        /// Nonce carried by the message.
        tx_nonce: u64,
        /// Nonce recorded in state.
        state_nonce: u64,
    },

    /// The sender cannot cover gas and value.
    #[error("insufficient funds for gas * price + value: {address}")]
    InsufficientFunds {
        /// Sender account.
        address: Address,
    },

    /// The message gas limit cannot cover the intrinsic cost.
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas {
        /// Gas offered by the message.
        have: u64,
        /// Intrinsic gas required.
        want: u64,
    },

    /// The block gas pool cannot cover the message.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),

    /// The interpreter failed internally.
    #[error("evm internal error: {0}")]
    Internal(String),
}

/// The EVM interpreter as the processor drives it.
///
/// The interpreter is bound to a [`BlockContext`] at construction and
/// rebound to a [`TxContext`] per executed message. State is passed into
/// each execution explicitly; the interpreter holds no state reference of
/// its own.
pub trait Evm<S: StateDb> {
    /// Rebind the per-transaction context ahead of executing a message.
    fn reset(&mut self, ctx: TxContext);

    /// Swap the transaction context, returning the previous one.
    fn set_tx_context(&mut self, ctx: TxContext) -> TxContext;

    /// Current transaction context.
    fn tx_context(&self) -> TxContext;

    /// Execute a converted message against `state`, buying gas from the
    /// block pool. Errors here are consensus-fatal; in-EVM failures are
    /// reported through the [`ExecutionResult`].
    fn apply_message(
        &mut self,
        state: &mut S,
        msg: &Message,
        gas_pool: &mut GasPool,
    ) -> Result<ExecutionResult, EvmError>;

    /// Raw message call with an explicit gas budget, outside block gas
    /// accounting. Used for nested settlement calls.
    fn call(
        &mut self,
        state: &mut S,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<Bytes, EvmError>;

    /// Run `f` under `ctx`, restoring the previous transaction context on
    /// every exit path.
    fn with_tx_context<R>(&mut self, ctx: TxContext, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        let prev = self.set_tx_context(ctx);
        let out = f(self);
        self.set_tx_context(prev);
        out
    }
}

/// Builds interpreter instances bound to a block environment.
pub trait EvmFactory<S: StateDb> {
    /// The interpreter type this factory produces.
    type Evm: Evm<S>;

    /// Build an interpreter for one block.
    fn create(&self, ctx: BlockContext, config: &EvmConfig) -> Self::Evm;
}
