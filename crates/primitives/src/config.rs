//! Chain configuration and fork predicates.

use serde::{Deserialize, Serialize};

/// Default chain id used when none is configured.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Chain-wide configuration consulted by the block processor.
///
/// Fork fields hold the activation block number; `None` means the fork
/// never activates on this chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    /// Chain id bound into transaction signatures.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Byzantium activation block.
    #[serde(default)]
    pub byzantium_block: Option<u64>,

    /// EIP-158 (empty account deletion) activation block.
    #[serde(default)]
    pub eip158_block: Option<u64>,
}

impl ChainConfig {
    /// Whether Byzantium rules are active at `number`.
    pub fn is_byzantium(&self, number: u64) -> bool {
        self.byzantium_block.is_some_and(|block| number >= block)
    }

    /// Whether EIP-158 empty-account deletion is active at `number`.
    pub fn is_eip158(&self, number: u64) -> bool {
        self.eip158_block.is_some_and(|block| number >= block)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { chain_id: DEFAULT_CHAIN_ID, byzantium_block: Some(0), eip158_block: Some(0) }
    }
}

const fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}
