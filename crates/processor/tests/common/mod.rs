//! Shared fixtures: an in-memory chain, mock engines, and a scriptable
//! EVM with an ERC-20-ish token that honors permit/transferFrom calldata.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use alloy_consensus::{SignableTransaction, TxLegacy};
use alloy_primitives::{
    Address, B256, Bytes, Signature, TxKind, U256, eip191_hash_message, keccak256,
};
use alloy_rlp::Encodable;
use ember_primitives::{Block, ChainConfig, Header, Log, Message, Receipt, Transaction, TxX402};
use ember_processor::{
    BlockContext, ChainContext, ConsensusEngine, EngineError, Evm, EvmConfig, EvmError,
    EvmFactory, ExecutionResult, GasPool, Posa, StateProcessor, TxContext, WorkerPool,
    X402Payload,
};
use ember_state::{MemoryState, StateDb};
use k256::ecdsa::SigningKey;

/// Chain id every test block runs under.
pub const CHAIN_ID: u64 = 1337;

/// Gas charged per mock message execution.
pub const MOCK_TX_GAS: u64 = 21_000;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn signing_key(byte: u8) -> SigningKey {
    SigningKey::from_bytes(&[byte; 32].into()).unwrap()
}

pub fn test_config() -> ChainConfig {
    ChainConfig { chain_id: CHAIN_ID, byzantium_block: Some(0), eip158_block: Some(0) }
}

pub fn header(number: u64, timestamp: u64) -> Header {
    Header {
        number,
        timestamp,
        gas_limit: 30_000_000,
        base_fee_per_gas: None,
        beneficiary: addr(0xfe),
        ..Default::default()
    }
}

pub fn block(number: u64, timestamp: u64, transactions: Vec<Transaction>) -> Block {
    Block::new(header(number, timestamp), transactions)
}

/// Sign a legacy value transfer.
pub fn legacy_transfer(
    key: &SigningKey,
    nonce: u64,
    to: Address,
    value: u64,
    gas_price: u128,
) -> Transaction {
    let tx = TxLegacy {
        chain_id: Some(CHAIN_ID),
        nonce,
        gas_price,
        gas_limit: MOCK_TX_GAS,
        to: TxKind::Call(to),
        value: U256::from(value),
        input: Bytes::new(),
    };
    let sighash = tx.signature_hash();
    let (sig, recid) = key.sign_prehash_recoverable(sighash.as_slice()).unwrap();
    let signature = Signature::new(
        U256::from_be_slice(&sig.r().to_bytes()),
        U256::from_be_slice(&sig.s().to_bytes()),
        recid.is_y_odd(),
    );
    tx.into_signed(signature).into()
}

/// Wrap an X402 payload into its transaction envelope.
pub fn x402_tx(payload: &X402Payload) -> Transaction {
    let mut input = Vec::new();
    payload.encode(&mut input);
    TxX402 { chain_id: CHAIN_ID, input: input.into() }.into()
}

/// Native-asset payload template signed by `key`; callers override fields
/// and re-sign as needed.
pub fn x402_payload(key: &SigningKey, to: Address, value: u64) -> X402Payload {
    let mut payload = X402Payload {
        from: Address::ZERO,
        to,
        value: U256::from(value),
        valid_after: 100,
        valid_before: 200,
        nonce: B256::repeat_byte(0x5a),
        asset: Address::ZERO,
        signature: Bytes::new(),
        permit: None,
    };
    sign_x402(&mut payload, key, 27);
    payload
}

/// Re-sign `payload` with `key`; `v_base` is 0 or 27.
pub fn sign_x402(payload: &mut X402Payload, key: &SigningKey, v_base: u8) {
    payload.from = Address::from_private_key(key);
    let digest = eip191_hash_message(payload.signing_message(CHAIN_ID));
    let (sig, recid) = key.sign_prehash_recoverable(digest.as_slice()).unwrap();
    let mut raw = Vec::with_capacity(65);
    raw.extend_from_slice(&sig.r().to_bytes());
    raw.extend_from_slice(&sig.s().to_bytes());
    raw.push(recid.to_byte() + v_base);
    payload.signature = raw.into();
}

// ---------------------------------------------------------------------------
// Chain context
// ---------------------------------------------------------------------------

/// Chain stub: no ancestor hashes.
pub struct MockChain;

impl ChainContext for MockChain {
    fn block_hash(&self, _number: u64) -> Option<B256> {
        None
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// Arguments the engine's finalize saw, for assertions.
#[derive(Clone, Debug, Default)]
pub struct FinalizeCall {
    pub common_txs: usize,
    pub receipts: usize,
    pub system_txs: usize,
}

/// Engine without the PoSA capability; finalize records its arguments.
#[derive(Clone, Default)]
pub struct NoopEngine {
    pub finalized: Arc<Mutex<Option<FinalizeCall>>>,
}

impl ConsensusEngine<MemoryState> for NoopEngine {
    fn finalize(
        &self,
        _chain: &dyn ChainContext,
        _header: &Header,
        _state: &mut MemoryState,
        common_txs: &mut Vec<Transaction>,
        _uncles: &[Header],
        receipts: &mut Vec<Receipt>,
        system_txs: Vec<Transaction>,
    ) -> Result<(), EngineError> {
        *self.finalized.lock().unwrap() = Some(FinalizeCall {
            common_txs: common_txs.len(),
            receipts: receipts.len(),
            system_txs: system_txs.len(),
        });
        Ok(())
    }
}

/// PoSA engine that classifies one sender's transactions as system
/// transactions and defers them to finalize.
#[derive(Clone)]
pub struct PosaEngine {
    pub system_sender: Address,
    pub finalized: Arc<Mutex<Option<FinalizeCall>>>,
}

impl PosaEngine {
    pub fn new(system_sender: Address) -> Self {
        Self { system_sender, finalized: Arc::default() }
    }
}

impl ConsensusEngine<MemoryState> for PosaEngine {
    fn finalize(
        &self,
        _chain: &dyn ChainContext,
        _header: &Header,
        _state: &mut MemoryState,
        common_txs: &mut Vec<Transaction>,
        _uncles: &[Header],
        receipts: &mut Vec<Receipt>,
        system_txs: Vec<Transaction>,
    ) -> Result<(), EngineError> {
        *self.finalized.lock().unwrap() = Some(FinalizeCall {
            common_txs: common_txs.len(),
            receipts: receipts.len(),
            system_txs: system_txs.len(),
        });
        Ok(())
    }

    fn posa(&self) -> Option<&dyn Posa<MemoryState>> {
        Some(self)
    }
}

impl Posa<MemoryState> for PosaEngine {
    fn pre_handle(
        &self,
        _chain: &dyn ChainContext,
        _header: &Header,
        _state: &mut MemoryState,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn extra_validator(
        &self,
        _header: &Header,
        _state: &MemoryState,
    ) -> Option<Arc<dyn ember_processor::ExtraValidator>> {
        None
    }

    fn is_system_transaction(
        &self,
        sender: Address,
        _tx: &Transaction,
        _header: &Header,
    ) -> Result<bool, EngineError> {
        Ok(sender == self.system_sender)
    }

    fn validate_tx(
        &self,
        _sender: Address,
        _tx: &Transaction,
        _header: &Header,
        _state: &MemoryState,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock EVM
// ---------------------------------------------------------------------------

/// How the mock token encodes the transferFrom result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenReturn {
    /// Standard ERC-20: a 32-byte boolean word.
    #[default]
    Word,
    /// Non-standard token: empty return data.
    Empty,
    /// Broken token: a short, non-decodable return.
    Short,
}

/// Scripted behavior for [`MockEvm`].
#[derive(Clone, Debug, Default)]
pub struct EvmBehavior {
    /// Fail the n-th (0-based) `apply_message` with an internal error.
    pub fail_apply_at: Option<usize>,
    /// Fail every nested call with an internal error.
    pub fail_calls: bool,
    /// transferFrom return encoding.
    pub token_return: TokenReturn,
}

/// One nested call the mock EVM served.
#[derive(Clone, Debug)]
pub struct CallRecord {
    pub caller: Address,
    pub to: Address,
    pub selector: [u8; 4],
    pub gas: u64,
    pub origin: Address,
    pub gas_price: U256,
}

pub fn transfer_topic() -> B256 {
    keccak256(b"Transfer(address,address,uint256)")
}

pub fn token_balance_slot(owner: Address) -> B256 {
    let mut preimage = Vec::with_capacity(21);
    preimage.extend_from_slice(owner.as_slice());
    preimage.push(0x01);
    keccak256(&preimage)
}

pub fn token_allowance_slot(owner: Address, spender: Address) -> B256 {
    let mut preimage = Vec::with_capacity(41);
    preimage.extend_from_slice(owner.as_slice());
    preimage.extend_from_slice(spender.as_slice());
    preimage.push(0x02);
    keccak256(&preimage)
}

pub fn set_token_balance(state: &mut MemoryState, token: Address, owner: Address, amount: U256) {
    state.set_storage(token, token_balance_slot(owner), B256::from(amount.to_be_bytes::<32>()));
}

pub fn token_balance(state: &MemoryState, token: Address, owner: Address) -> U256 {
    U256::from_be_bytes(state.storage(token, token_balance_slot(owner)).0)
}

/// Value-transfer EVM with an ERC-20-ish token backing nested calls.
///
/// `apply_message` moves native value and charges a flat 21000 gas;
/// `call` decodes permit/transferFrom calldata against token storage in
/// the state database and emits a Transfer log on success.
pub struct MockEvm {
    ctx: TxContext,
    behavior: EvmBehavior,
    apply_calls: usize,
    calls: Arc<Mutex<Vec<CallRecord>>>,
}

impl MockEvm {
    fn word_address(input: &[u8], word: usize) -> Address {
        Address::from_slice(&input[4 + word * 32 + 12..4 + (word + 1) * 32])
    }

    fn word_u256(input: &[u8], word: usize) -> U256 {
        U256::from_be_slice(&input[4 + word * 32..4 + (word + 1) * 32])
    }

    fn serve_permit(&mut self, state: &mut MemoryState, token: Address, input: &[u8]) -> Bytes {
        let owner = Self::word_address(input, 0);
        let spender = Self::word_address(input, 1);
        let value = Self::word_u256(input, 2);
        state.set_storage(
            token,
            token_allowance_slot(owner, spender),
            B256::from(value.to_be_bytes::<32>()),
        );
        Bytes::new()
    }

    fn serve_transfer_from(
        &mut self,
        state: &mut MemoryState,
        token: Address,
        spender: Address,
        input: &[u8],
    ) -> Bytes {
        let from = Self::word_address(input, 0);
        let to = Self::word_address(input, 1);
        let value = Self::word_u256(input, 2);

        let allowance_slot = token_allowance_slot(from, spender);
        let allowance = U256::from_be_bytes(state.storage(token, allowance_slot).0);
        let balance = token_balance(state, token, from);
        let ok = allowance >= value && balance >= value;
        if ok {
            state.set_storage(
                token,
                allowance_slot,
                B256::from((allowance - value).to_be_bytes::<32>()),
            );
            set_token_balance(state, token, from, balance - value);
            let to_balance = token_balance(state, token, to);
            set_token_balance(state, token, to, to_balance + value);
            state.add_log(Log::new(
                token,
                vec![
                    transfer_topic(),
                    B256::left_padding_from(from.as_slice()),
                    B256::left_padding_from(to.as_slice()),
                ],
                Bytes::from(value.to_be_bytes::<32>().to_vec()),
            ));
        }

        match self.behavior.token_return {
            TokenReturn::Word => {
                let word = if ok { U256::ONE } else { U256::ZERO };
                Bytes::from(word.to_be_bytes::<32>().to_vec())
            }
            TokenReturn::Empty => Bytes::new(),
            TokenReturn::Short => Bytes::from(vec![0x01]),
        }
    }
}

impl Evm<MemoryState> for MockEvm {
    fn reset(&mut self, ctx: TxContext) {
        self.ctx = ctx;
    }

    fn set_tx_context(&mut self, ctx: TxContext) -> TxContext {
        std::mem::replace(&mut self.ctx, ctx)
    }

    fn tx_context(&self) -> TxContext {
        self.ctx.clone()
    }

    fn apply_message(
        &mut self,
        state: &mut MemoryState,
        msg: &Message,
        gas_pool: &mut GasPool,
    ) -> Result<ExecutionResult, EvmError> {
        let call_index = self.apply_calls;
        self.apply_calls += 1;
        if self.behavior.fail_apply_at == Some(call_index) {
            return Err(EvmError::Internal("injected failure".into()));
        }

        gas_pool.sub_gas(msg.gas_limit)?;
        let gas_used = MOCK_TX_GAS;

        let cost = U256::from(msg.gas_price) * U256::from(gas_used) + msg.value;
        if state.balance(msg.from) < cost {
            return Err(EvmError::InsufficientFunds { address: msg.from });
        }
        state.sub_balance(msg.from, cost);
        if let Some(to) = msg.to {
            state.add_balance(to, msg.value);
        }

        gas_pool.add_gas(msg.gas_limit - gas_used);
        Ok(ExecutionResult::Success { gas_used, output: Bytes::new() })
    }

    fn call(
        &mut self,
        state: &mut MemoryState,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        _value: U256,
    ) -> Result<Bytes, EvmError> {
        let selector: [u8; 4] = input.get(..4).and_then(|s| s.try_into().ok()).unwrap_or_default();
        self.calls.lock().unwrap().push(CallRecord {
            caller,
            to,
            selector,
            gas,
            origin: self.ctx.origin,
            gas_price: self.ctx.gas_price,
        });
        if self.behavior.fail_calls {
            return Err(EvmError::Internal("injected call failure".into()));
        }

        const PERMIT: [u8; 4] = [0xd5, 0x05, 0xac, 0xcf];
        const TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];
        match selector {
            PERMIT => Ok(self.serve_permit(state, to, &input)),
            TRANSFER_FROM => Ok(self.serve_transfer_from(state, to, caller, &input)),
            _ => Ok(Bytes::new()),
        }
    }
}

/// Factory handing out [`MockEvm`] instances that share a call log.
#[derive(Clone, Default)]
pub struct MockEvmFactory {
    pub behavior: EvmBehavior,
    pub calls: Arc<Mutex<Vec<CallRecord>>>,
}

impl MockEvmFactory {
    pub fn with_behavior(behavior: EvmBehavior) -> Self {
        Self { behavior, calls: Arc::default() }
    }
}

impl EvmFactory<MemoryState> for MockEvmFactory {
    type Evm = MockEvm;

    fn create(&self, _ctx: BlockContext, _config: &EvmConfig) -> MockEvm {
        MockEvm {
            ctx: TxContext::default(),
            behavior: self.behavior.clone(),
            apply_calls: 0,
            calls: Arc::clone(&self.calls),
        }
    }
}

// ---------------------------------------------------------------------------
// Processor assembly
// ---------------------------------------------------------------------------

/// Processor over the mock chain with a dedicated two-thread pool.
pub fn processor<C: ConsensusEngine<MemoryState>>(
    engine: C,
    factory: MockEvmFactory,
) -> StateProcessor<MemoryState, C, MockEvmFactory> {
    processor_with_pool(engine, factory, WorkerPool::new(2).unwrap())
}

pub fn processor_with_pool<C: ConsensusEngine<MemoryState>>(
    engine: C,
    factory: MockEvmFactory,
    pool: WorkerPool,
) -> StateProcessor<MemoryState, C, MockEvmFactory> {
    StateProcessor::new(test_config(), Arc::new(MockChain), engine, factory, pool)
}
