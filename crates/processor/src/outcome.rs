//! Block processing outcome.

use ember_primitives::{Log, Receipt};

/// Everything a processed block yields besides the mutated state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Receipts in transaction order; system transactions emit none.
    pub receipts: Vec<Receipt>,
    /// In-order concatenation of every receipt's logs.
    pub logs: Vec<Log>,
    /// Total gas burned by the block's executed transactions.
    pub gas_used: u64,
}
