//! Gasless X402 payment settlement.
//!
//! An X402 transaction carries an RLP payload authorizing a one-shot
//! payment: native value moved directly in state, or an ERC-20 amount
//! pulled through nested `permit` + `transferFrom` calls executed by the
//! recipient. Settlement is replay-protected through a per-`(from, nonce)`
//! marker slot under a fixed registry pseudo-account, so the marker is
//! trie-covered and reorg-safe.

use alloy_primitives::{
    Address, B256, Bloom, Bytes, Signature, U256, address, b256, eip191_hash_message, hex,
    keccak256,
};
use alloy_rlp::{Decodable, Encodable, Header as RlpHeader, RlpDecodable, RlpEncodable};
use ember_primitives::{
    ChainConfig, Header, Receipt, ReceiptStatus, Transaction, TxType,
};
use ember_state::StateDb;
use tracing::debug;

use crate::{Commitment, Evm, ProcessError, TxContext};

/// Pseudo-account whose storage holds the per-`(from, nonce)` replay
/// markers.
pub const X402_REGISTRY: Address = address!("0000000000000000000000000000000000000403");

/// Marker value written once a payment settles.
const REPLAY_MARKER: B256 =
    b256!("0000000000000000000000000000000000000000000000000000000000000001");

/// EIP-2612 permit arguments piggybacked on a token payment.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct X402Permit {
    /// Allowance to grant.
    pub value: U256,
    /// Permit deadline.
    pub deadline: U256,
    /// Recovery id of the permit signature.
    pub v: u8,
    /// `r` component of the permit signature.
    pub r: Bytes,
    /// `s` component of the permit signature.
    pub s: Bytes,
}

/// Decoded X402 payment payload, carried RLP-encoded in the transaction
/// data field. The optional permit is the trailing list element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X402Payload {
    /// Paying account.
    pub from: Address,
    /// Receiving account, which also drives token settlement.
    pub to: Address,
    /// Amount to transfer.
    pub value: U256,
    /// Payment is invalid before this timestamp.
    pub valid_after: u64,
    /// Payment is invalid after this timestamp.
    pub valid_before: u64,
    /// Payer-chosen replay nonce.
    pub nonce: B256,
    /// Token to transfer; the zero address selects the native asset.
    pub asset: Address,
    /// 65-byte payer signature over [`signing_message`](Self::signing_message).
    pub signature: Bytes,
    /// Permit to apply before pulling token funds.
    pub permit: Option<X402Permit>,
}

impl X402Payload {
    /// Strictly decode a payload from a transaction data field. Trailing
    /// bytes inside or after the list are rejected.
    pub fn from_input(data: &[u8]) -> alloy_rlp::Result<Self> {
        let mut buf = data;
        let payload = Self::decode(&mut buf)?;
        if !buf.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }
        Ok(payload)
    }

    /// The ASCII message the payer signs, personal-message hashed under
    /// EIP-191. Hex fields are lowercase; the value drops leading zeros.
    pub fn signing_message(&self, chain_id: u64) -> String {
        format!(
            "x402-payment:0x{}:0x{}:0x{}:{}:{}:0x{}:0x{}:{}",
            hex::encode(self.from),
            hex::encode(self.to),
            hex_no_leading_zeros(self.value),
            self.valid_after,
            self.valid_before,
            hex::encode(self.nonce),
            hex::encode(self.asset),
            chain_id,
        )
    }

    /// Replay-marker slot for this payment under [`X402_REGISTRY`].
    pub fn replay_key(&self) -> B256 {
        let mut preimage = [0u8; 52];
        preimage[..20].copy_from_slice(self.from.as_slice());
        preimage[20..].copy_from_slice(self.nonce.as_slice());
        keccak256(preimage)
    }

    fn rlp_payload_length(&self) -> usize {
        let mut length = self.from.length()
            + self.to.length()
            + self.value.length()
            + self.valid_after.length()
            + self.valid_before.length()
            + self.nonce.length()
            + self.asset.length()
            + self.signature.length();
        if let Some(permit) = &self.permit {
            length += permit.length();
        }
        length
    }
}

impl Encodable for X402Payload {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        RlpHeader { list: true, payload_length: self.rlp_payload_length() }.encode(out);
        self.from.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.valid_after.encode(out);
        self.valid_before.encode(out);
        self.nonce.encode(out);
        self.asset.encode(out);
        self.signature.encode(out);
        if let Some(permit) = &self.permit {
            permit.encode(out);
        }
    }

    fn length(&self) -> usize {
        let payload_length = self.rlp_payload_length();
        RlpHeader { list: true, payload_length }.length() + payload_length
    }
}

impl Decodable for X402Payload {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = RlpHeader::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if buf.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let (mut body, rest) = buf.split_at(header.payload_length);
        *buf = rest;

        let payload = Self {
            from: Decodable::decode(&mut body)?,
            to: Decodable::decode(&mut body)?,
            value: Decodable::decode(&mut body)?,
            valid_after: Decodable::decode(&mut body)?,
            valid_before: Decodable::decode(&mut body)?,
            nonce: Decodable::decode(&mut body)?,
            asset: Decodable::decode(&mut body)?,
            signature: Decodable::decode(&mut body)?,
            permit: if body.is_empty() { None } else { Some(X402Permit::decode(&mut body)?) },
        };
        if !body.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength);
        }
        Ok(payload)
    }
}

/// Settle one X402 transaction and build its gasless receipt.
///
/// Only a malformed payload aborts the block; every validation or
/// settlement failure is recorded as a failed receipt. The receipt keeps
/// the running cumulative gas untouched and reports zero gas used.
#[allow(clippy::too_many_arguments)]
pub(crate) fn settle<S, E>(
    config: &ChainConfig,
    header: &Header,
    block_hash: B256,
    tx: &Transaction,
    tx_index: usize,
    state: &mut S,
    evm: &mut E,
    commitment: Commitment,
    used_gas: u64,
) -> Result<Receipt, ProcessError>
where
    S: StateDb,
    E: Evm<S>,
{
    let payload = X402Payload::from_input(tx.input())
        .map_err(|source| ProcessError::X402Payload { tx_hash: tx.hash(), source })?;

    state.prepare(tx.hash(), tx_index as u64);

    let now = header.timestamp;
    let in_window = payload.valid_after <= now && now <= payload.valid_before;
    let sig_ok = verify_signature(&payload, config.chain_id);
    let replay_key = payload.replay_key();
    let unused = state.storage(X402_REGISTRY, replay_key).is_zero();

    let mut settled = false;
    if in_window && sig_ok && unused {
        settled = if payload.asset.is_zero() {
            settle_native(state, &payload)
        } else {
            settle_token(state, evm, header, &payload)
        };
        // The marker is written on success only; a failed attempt must
        // not burn the payer's nonce.
        if settled {
            state.set_storage(X402_REGISTRY, replay_key, REPLAY_MARKER);
        }
    }

    let post_state = commitment.commit(state);

    let mut receipt = Receipt {
        tx_type: TxType::X402,
        post_state,
        status: ReceiptStatus::from_success(settled),
        cumulative_gas_used: used_gas,
        bloom: Bloom::ZERO,
        logs: Vec::new(),
        tx_hash: tx.hash(),
        contract_address: None,
        gas_used: 0,
        block_hash,
        block_number: header.number,
        transaction_index: state.tx_index(),
    };
    receipt.logs = state.logs(tx.hash(), block_hash);

    if !settled {
        debug!(tx_hash = %tx.hash(), in_window, sig_ok, unused, "x402 settlement failed");
    }

    Ok(receipt)
}

fn settle_native<S: StateDb>(state: &mut S, payload: &X402Payload) -> bool {
    if state.balance(payload.from) < payload.value {
        return false;
    }
    state.sub_balance(payload.from, payload.value);
    state.add_balance(payload.to, payload.value);
    true
}

fn settle_token<S, E>(state: &mut S, evm: &mut E, header: &Header, payload: &X402Payload) -> bool
where
    S: StateDb,
    E: Evm<S>,
{
    // Both nested calls originate from the recipient, price gas at zero,
    // and run with the header's gas limit outside the block gas pool.
    let ctx = TxContext { origin: payload.to, gas_price: U256::ZERO };

    if let Some(permit) = &payload.permit {
        let input = permit_calldata(payload, permit);
        let outcome = evm.with_tx_context(ctx.clone(), |evm| {
            evm.call(&mut *state, payload.to, payload.asset, input, header.gas_limit, U256::ZERO)
        });
        if let Err(err) = outcome {
            debug!(%err, asset = %payload.asset, "x402 permit call failed");
        }
    }

    let input = transfer_from_calldata(payload);
    let outcome = evm.with_tx_context(ctx, |evm| {
        evm.call(&mut *state, payload.to, payload.asset, input, header.gas_limit, U256::ZERO)
    });
    match outcome {
        Err(err) => {
            debug!(%err, asset = %payload.asset, "x402 transferFrom call failed");
            false
        }
        // Non-standard tokens return nothing on success.
        Ok(ret) if ret.is_empty() => true,
        // Standard ERC-20: a 32-byte boolean word; treat non-zero as true.
        Ok(ret) if ret.len() >= 32 => ret.iter().any(|byte| *byte != 0),
        Ok(_) => false,
    }
}

fn verify_signature(payload: &X402Payload, chain_id: u64) -> bool {
    let sig = payload.signature.as_ref();
    if sig.len() != 65 {
        return false;
    }
    // Normalize on a copy; the payload bytes are never rewritten.
    let mut v = sig[64];
    if v >= 27 {
        v -= 27;
    }
    if v > 1 {
        return false;
    }
    let signature = Signature::new(
        U256::from_be_slice(&sig[..32]),
        U256::from_be_slice(&sig[32..64]),
        v == 1,
    );
    let digest = eip191_hash_message(payload.signing_message(chain_id));
    signature.recover_address_from_prehash(&digest).is_ok_and(|addr| addr == payload.from)
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn left_pad32(bytes: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    let src = if bytes.len() > 32 { &bytes[bytes.len() - 32..] } else { bytes };
    word[32 - src.len()..].copy_from_slice(src);
    word
}

fn hex_no_leading_zeros(value: U256) -> String {
    let encoded = hex::encode(value.to_be_bytes::<32>());
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

fn permit_calldata(payload: &X402Payload, permit: &X402Permit) -> Bytes {
    let mut data = Vec::with_capacity(4 + 7 * 32);
    data.extend_from_slice(&selector(
        "permit(address,address,uint256,uint256,uint8,bytes32,bytes32)",
    ));
    data.extend_from_slice(&address_word(payload.from));
    data.extend_from_slice(&address_word(payload.to));
    data.extend_from_slice(&permit.value.to_be_bytes::<32>());
    data.extend_from_slice(&permit.deadline.to_be_bytes::<32>());
    data.extend_from_slice(&left_pad32(&[permit.v]));
    data.extend_from_slice(&left_pad32(&permit.r));
    data.extend_from_slice(&left_pad32(&permit.s));
    data.into()
}

fn transfer_from_calldata(payload: &X402Payload) -> Bytes {
    let mut data = Vec::with_capacity(4 + 3 * 32);
    data.extend_from_slice(&selector("transferFrom(address,address,uint256)"));
    data.extend_from_slice(&address_word(payload.from));
    data.extend_from_slice(&address_word(payload.to));
    data.extend_from_slice(&payload.value.to_be_bytes::<32>());
    data.into()
}
