//! Per-transaction state commitment.

use alloy_primitives::B256;
use ember_primitives::ChainConfig;
use ember_state::StateDb;

/// How state is committed after each transaction, decided once per block
/// by the fork rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commitment {
    /// Post-Byzantium: settle pending changes; receipts carry no root.
    Finalise {
        /// EIP-158 empty-account deletion flag.
        delete_empty: bool,
    },
    /// Pre-Byzantium: receipts carry the intermediate state root.
    IntermediateRoot {
        /// EIP-158 empty-account deletion flag.
        delete_empty: bool,
    },
}

impl Commitment {
    /// Commitment mode for a block at `number`.
    pub fn for_block(config: &ChainConfig, number: u64) -> Self {
        let delete_empty = config.is_eip158(number);
        if config.is_byzantium(number) {
            Self::Finalise { delete_empty }
        } else {
            Self::IntermediateRoot { delete_empty }
        }
    }

    /// Commit one transaction's pending changes. Returns the intermediate
    /// root in pre-Byzantium mode.
    pub fn commit<S: StateDb>(&self, state: &mut S) -> Option<B256> {
        match *self {
            Self::Finalise { delete_empty } => {
                state.finalise(delete_empty);
                None
            }
            Self::IntermediateRoot { delete_empty } => {
                Some(state.intermediate_root(delete_empty))
            }
        }
    }
}
