//! Block gas accounting.

use std::fmt;

use thiserror::Error;

/// The block's gas budget is exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("gas limit reached")]
pub struct GasPoolError;

/// Remaining gas budget of a block under execution.
///
/// Initialized to the header's gas limit and drawn down as transactions
/// buy gas; refunds flow back through [`add_gas`](Self::add_gas).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasPool(u64);

impl GasPool {
    /// Pool charged with `limit` gas.
    pub const fn new(limit: u64) -> Self {
        Self(limit)
    }

    /// Remaining gas.
    pub const fn gas(&self) -> u64 {
        self.0
    }

    /// Draw `amount` gas from the pool.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        if self.0 < amount {
            return Err(GasPoolError);
        }
        self.0 -= amount;
        Ok(())
    }

    /// Return `amount` gas to the pool.
    pub fn add_gas(&mut self, amount: u64) {
        self.0 = self.0.saturating_add(amount);
    }
}

impl fmt::Display for GasPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
