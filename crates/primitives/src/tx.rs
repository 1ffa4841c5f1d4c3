//! Typed transaction envelope and message conversion.

use alloy_consensus::{Signed, TxEip1559, TxLegacy};
use alloy_primitives::{Address, B256, Bytes, SignatureError, TxKind, U256, keccak256};
use alloy_rlp::{Encodable, RlpEncodable};
use thiserror::Error;

use crate::Signer;

/// Transaction type tags as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    /// Untyped pre-EIP-2718 transaction.
    Legacy = 0x00,
    /// EIP-1559 dynamic-fee transaction.
    DynamicFee = 0x02,
    /// Gasless X402 payment settlement.
    X402 = 0x40,
}

/// Gasless payment envelope. `input` carries the RLP-encoded settlement
/// payload; the payment itself is authorized by the signature embedded in
/// that payload, not by an envelope signature.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable)]
pub struct TxX402 {
    /// Chain the payment is bound to.
    pub chain_id: u64,
    /// RLP-encoded settlement payload.
    pub input: Bytes,
}

impl TxX402 {
    /// Envelope hash: `keccak256(type || rlp([chain_id, input]))`.
    pub fn hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(1 + self.length());
        buf.push(TxType::X402 as u8);
        self.encode(&mut buf);
        keccak256(&buf)
    }
}

/// Failure converting or recovering a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Signature recovery failed.
    #[error("signature recovery failed: {0}")]
    Recovery(#[from] SignatureError),

    /// The transaction is bound to a different chain.
    #[error("chain id mismatch: tx {tx}, signer {signer}")]
    ChainIdMismatch {
        /// Chain id carried by the transaction.
        tx: u64,
        /// Chain id the signer expects.
        signer: u64,
    },

    /// Dynamic fee cap below the block base fee.
    #[error("max fee per gas {max_fee} below block base fee {base_fee}")]
    FeeCapTooLow {
        /// The transaction's fee cap.
        max_fee: u128,
        /// The block's base fee.
        base_fee: u64,
    },

    /// X402 envelopes settle during block processing and never run as
    /// messages.
    #[error("x402 transactions settle during block processing")]
    NotExecutable,
}

/// A signed transaction as carried in a block body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// Untyped legacy transaction, optionally EIP-155 protected.
    Legacy(Signed<TxLegacy>),
    /// EIP-1559 dynamic-fee transaction.
    DynamicFee(Signed<TxEip1559>),
    /// Gasless X402 payment settlement.
    X402(TxX402),
}

impl Transaction {
    /// The envelope's type tag.
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Legacy(_) => TxType::Legacy,
            Self::DynamicFee(_) => TxType::DynamicFee,
            Self::X402(_) => TxType::X402,
        }
    }

    /// Transaction hash.
    pub fn hash(&self) -> B256 {
        match self {
            Self::Legacy(signed) => *signed.hash(),
            Self::DynamicFee(signed) => *signed.hash(),
            Self::X402(tx) => tx.hash(),
        }
    }

    /// Sender nonce. X402 envelopes carry none.
    pub fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(signed) => signed.tx().nonce,
            Self::DynamicFee(signed) => signed.tx().nonce,
            Self::X402(_) => 0,
        }
    }

    /// Call target; `None` for contract creation and for X402.
    pub fn to(&self) -> Option<Address> {
        let kind = match self {
            Self::Legacy(signed) => signed.tx().to,
            Self::DynamicFee(signed) => signed.tx().to,
            Self::X402(_) => return None,
        };
        match kind {
            TxKind::Call(address) => Some(address),
            TxKind::Create => None,
        }
    }

    /// Native value transferred by the envelope itself.
    pub fn value(&self) -> U256 {
        match self {
            Self::Legacy(signed) => signed.tx().value,
            Self::DynamicFee(signed) => signed.tx().value,
            Self::X402(_) => U256::ZERO,
        }
    }

    /// Gas limit of the envelope. X402 settlements are gasless.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Self::Legacy(signed) => signed.tx().gas_limit,
            Self::DynamicFee(signed) => signed.tx().gas_limit,
            Self::X402(_) => 0,
        }
    }

    /// Data payload.
    pub fn input(&self) -> &Bytes {
        match self {
            Self::Legacy(signed) => &signed.tx().input,
            Self::DynamicFee(signed) => &signed.tx().input,
            Self::X402(tx) => &tx.input,
        }
    }

    /// Convert to an executable message under the block's base fee.
    ///
    /// Recovers the sender through `signer` and resolves the effective gas
    /// price: legacy transactions pay their stated price, dynamic-fee
    /// transactions pay `min(max_fee, base_fee + priority_fee)` and are
    /// rejected when the fee cap cannot cover the base fee.
    pub fn as_message(
        &self,
        signer: &Signer,
        base_fee: Option<u64>,
    ) -> Result<Message, TransactionError> {
        let from = signer.recover(self)?;
        let gas_price = match self {
            Self::Legacy(signed) => signed.tx().gas_price,
            Self::DynamicFee(signed) => effective_gas_price(signed.tx(), base_fee)?,
            Self::X402(_) => return Err(TransactionError::NotExecutable),
        };
        Ok(Message {
            from,
            to: self.to(),
            nonce: self.nonce(),
            value: self.value(),
            gas_limit: self.gas_limit(),
            gas_price,
            input: self.input().clone(),
        })
    }
}

impl From<Signed<TxLegacy>> for Transaction {
    fn from(signed: Signed<TxLegacy>) -> Self {
        Self::Legacy(signed)
    }
}

impl From<Signed<TxEip1559>> for Transaction {
    fn from(signed: Signed<TxEip1559>) -> Self {
        Self::DynamicFee(signed)
    }
}

impl From<TxX402> for Transaction {
    fn from(tx: TxX402) -> Self {
        Self::X402(tx)
    }
}

fn effective_gas_price(
    tx: &TxEip1559,
    base_fee: Option<u64>,
) -> Result<u128, TransactionError> {
    let Some(base_fee) = base_fee else {
        return Ok(tx.max_fee_per_gas);
    };
    if tx.max_fee_per_gas < u128::from(base_fee) {
        return Err(TransactionError::FeeCapTooLow { max_fee: tx.max_fee_per_gas, base_fee });
    }
    Ok(tx.max_fee_per_gas.min(u128::from(base_fee) + tx.max_priority_fee_per_gas))
}

/// An executable message derived from a signed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Recovered sender.
    pub from: Address,
    /// Call target; `None` creates a contract.
    pub to: Option<Address>,
    /// Sender nonce.
    pub nonce: u64,
    /// Native value to transfer.
    pub value: U256,
    /// Gas budget for execution.
    pub gas_limit: u64,
    /// Effective price per gas unit.
    pub gas_price: u128,
    /// Call data.
    pub input: Bytes,
}
