//! The block driver.

use std::marker::PhantomData;
use std::sync::Arc;

use ember_primitives::{Block, ChainConfig, Receipt, Signer, Transaction, TxType};
use ember_state::StateDb;
use tracing::trace;

use crate::{
    ApplyError, BloomJoin, BlockContext, ChainContext, Commitment, ConsensusEngine, EvmConfig,
    EvmFactory, GasPool, ProcessError, ProcessOutcome, WorkerPool, apply::apply, x402,
};

/// Transitions world state from one block to the next.
///
/// The driver executes a block's transactions strictly in order: common
/// transactions through the EVM, X402 payments through gasless
/// settlement, and engine-classified system transactions deferred to the
/// engine's finalization. Per-receipt log blooms are built on the shared
/// worker pool and joined before the block is handed to the engine.
pub struct StateProcessor<S, C, F> {
    config: ChainConfig,
    chain: Arc<dyn ChainContext>,
    engine: C,
    evm_factory: F,
    workers: WorkerPool,
    _state: PhantomData<S>,
}

impl<S, C, F> std::fmt::Debug for StateProcessor<S, C, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProcessor")
            .field("config", &self.config)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl<S, C, F> StateProcessor<S, C, F>
where
    S: StateDb,
    C: ConsensusEngine<S>,
    F: EvmFactory<S>,
{
    /// Processor over `chain` with a consensus engine, an EVM factory,
    /// and a shared worker pool.
    pub fn new(
        config: ChainConfig,
        chain: Arc<dyn ChainContext>,
        engine: C,
        evm_factory: F,
        workers: WorkerPool,
    ) -> Self {
        Self { config, chain, engine, evm_factory, workers, _state: PhantomData }
    }

    /// Execute `block` against `state`, returning the receipts, the
    /// aggregated logs, and the total gas used.
    ///
    /// Any error invalidates the block: state may be partially mutated,
    /// but no receipts escape, and every dispatched bloom task has
    /// completed by the time the error is returned.
    pub fn process(
        &self,
        block: &Block,
        state: &mut S,
        evm_config: &EvmConfig,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut bloom = BloomJoin::new(&self.workers);
        let outcome = self.process_block(block, state, evm_config, &mut bloom);
        // Unwind path: a failed block must not leave bloom workers
        // racing the dropped receipts.
        bloom.drain();
        outcome
    }

    fn process_block(
        &self,
        block: &Block,
        state: &mut S,
        evm_config: &EvmConfig,
        bloom: &mut BloomJoin<'_>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let header = &block.header;
        let block_hash = block.hash();
        let block_number = header.number;

        let mut used_gas = 0u64;
        let mut gas_pool = GasPool::new(header.gas_limit);
        let mut receipts: Vec<Receipt> = Vec::with_capacity(block.transactions.len());
        let mut all_logs = Vec::new();

        let mut ctx = BlockContext::new(header, Arc::clone(&self.chain), None);
        let posa = self.engine.posa();
        if let Some(posa) = posa {
            posa.pre_handle(self.chain.as_ref(), header, state)?;
            ctx.extra_validator = posa.extra_validator(header, state);
        }
        let mut evm = self.evm_factory.create(ctx, evm_config);

        let signer = Signer::for_block(&self.config, block_number);
        state.preload_accounts(block, &signer);

        let commitment = Commitment::for_block(&self.config, block_number);

        let mut common_txs: Vec<Transaction> = Vec::with_capacity(block.transactions.len());
        let mut system_txs: Vec<Transaction> = Vec::new();

        for (index, tx) in block.transactions.iter().enumerate() {
            if tx.tx_type() == TxType::X402 {
                let receipt = x402::settle(
                    &self.config,
                    header,
                    block_hash,
                    tx,
                    index,
                    state,
                    &mut evm,
                    commitment,
                    used_gas,
                )?;
                bloom.schedule(receipts.len(), receipt.logs.clone());
                all_logs.extend(receipt.logs.iter().cloned());
                receipts.push(receipt);
                common_txs.push(tx.clone());
                continue;
            }

            if let Some(posa) = posa {
                let sender = signer.recover(tx)?;
                if posa.is_system_transaction(sender, tx, header)? {
                    system_txs.push(tx.clone());
                    continue;
                }
                posa.validate_tx(sender, tx, header, state)?;
            }

            let msg = tx.as_message(&signer, header.base_fee_per_gas).map_err(|source| {
                ProcessError::Apply {
                    index,
                    tx_hash: tx.hash(),
                    source: ApplyError::Message(source),
                }
            })?;
            state.prepare(tx.hash(), index as u64);
            let receipt = apply(
                &msg,
                tx,
                &mut gas_pool,
                state,
                block_number,
                block_hash,
                commitment,
                &mut used_gas,
                &mut evm,
            )
            .map_err(|source| ProcessError::Apply { index, tx_hash: tx.hash(), source })?;

            bloom.schedule(receipts.len(), receipt.logs.clone());
            all_logs.extend(receipt.logs.iter().cloned());
            receipts.push(receipt);
            common_txs.push(tx.clone());
        }

        bloom.join(&mut receipts);

        self.engine.finalize(
            self.chain.as_ref(),
            header,
            state,
            &mut common_txs,
            &block.uncles,
            &mut receipts,
            system_txs,
        )?;

        trace!(number = block_number, txs = receipts.len(), gas_used = used_gas, "processed block");

        Ok(ProcessOutcome { receipts, logs: all_logs, gas_used: used_gas })
    }
}
