//! Single-transaction execution and receipt construction.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bloom, U256};
use ember_primitives::{
    ChainConfig, Header, Message, Receipt, ReceiptStatus, Signer, Transaction, logs_bloom,
};
use ember_state::StateDb;
use tracing::debug;

use crate::{
    ApplyError, BlockContext, ChainContext, Commitment, Evm, EvmConfig, EvmFactory,
    ExtraValidator, GasPool, TxContext,
};

/// Execute a converted message and build its receipt.
///
/// The bloom is left zeroed; the block driver schedules it onto the
/// worker pool, and the standalone entry below computes it inline.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply<S, E>(
    msg: &Message,
    tx: &Transaction,
    gas_pool: &mut GasPool,
    state: &mut S,
    block_number: u64,
    block_hash: B256,
    commitment: Commitment,
    used_gas: &mut u64,
    evm: &mut E,
) -> Result<Receipt, ApplyError>
where
    S: StateDb,
    E: Evm<S>,
{
    evm.reset(TxContext { origin: msg.from, gas_price: U256::from(msg.gas_price) });

    let result = evm.apply_message(state, msg, gas_pool)?;

    let post_state = commitment.commit(state);
    *used_gas += result.gas_used();

    let mut receipt = Receipt {
        tx_type: tx.tx_type(),
        post_state,
        status: ReceiptStatus::from_success(result.is_success()),
        cumulative_gas_used: *used_gas,
        bloom: Bloom::ZERO,
        logs: Vec::new(),
        tx_hash: tx.hash(),
        contract_address: None,
        gas_used: result.gas_used(),
        block_hash,
        block_number,
        transaction_index: state.tx_index(),
    };
    if msg.to.is_none() {
        receipt.contract_address = Some(msg.from.create(msg.nonce));
    }
    receipt.logs = state.logs(tx.hash(), block_hash);

    if let Some(reason) = result.vm_error() {
        debug!(tx_hash = %tx.hash(), reason, "transaction failed in the evm");
    }

    Ok(receipt)
}

/// Apply a single transaction outside block processing.
///
/// Builds a fresh EVM environment from `header`, honoring the optional
/// beneficiary override and engine-provided extra validator. The caller
/// owns log-journal preparation and gas-pool lifecycle, mirroring the
/// block driver.
#[allow(clippy::too_many_arguments)]
pub fn apply_transaction<S, F>(
    config: &ChainConfig,
    chain: Arc<dyn ChainContext>,
    factory: &F,
    author: Option<Address>,
    gas_pool: &mut GasPool,
    state: &mut S,
    header: &Header,
    tx: &Transaction,
    used_gas: &mut u64,
    evm_config: &EvmConfig,
    extra_validator: Option<Arc<dyn ExtraValidator>>,
) -> Result<Receipt, ApplyError>
where
    S: StateDb,
    F: EvmFactory<S>,
{
    let signer = Signer::for_block(config, header.number);
    let msg = tx.as_message(&signer, header.base_fee_per_gas)?;

    let mut ctx = BlockContext::new(header, chain, author);
    ctx.extra_validator = extra_validator;
    let mut evm = factory.create(ctx, evm_config);

    let commitment = Commitment::for_block(config, header.number);
    let mut receipt = apply(
        &msg,
        tx,
        gas_pool,
        state,
        header.number,
        header.hash_slow(),
        commitment,
        used_gas,
        &mut evm,
    )?;
    receipt.bloom = logs_bloom(&receipt.logs);
    Ok(receipt)
}
