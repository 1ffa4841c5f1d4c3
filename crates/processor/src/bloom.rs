//! Off-thread log-bloom construction.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::Bloom;
use crossbeam_channel::{Receiver, Sender};
use ember_primitives::{Log, Receipt, logs_bloom};

/// Shared worker pool for per-receipt bloom computation.
///
/// The handle is created by the node and passed to the processor at
/// construction; its lifecycle is owned outside block processing.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Build a pool with `threads` workers; `0` lets the runtime pick.
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Submit a job. Submission never blocks.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

/// Tracks the bloom computations dispatched for one block.
///
/// The dispatch counter is only touched by the driver thread; workers
/// send finished blooms over the channel. [`join`](Self::join) and
/// [`drain`](Self::drain) are the barrier: one of them must run before
/// the processor returns, on success and failure paths alike.
pub struct BloomJoin<'a> {
    pool: &'a WorkerPool,
    results_tx: Sender<(usize, Bloom)>,
    results_rx: Receiver<(usize, Bloom)>,
    outstanding: usize,
}

impl<'a> BloomJoin<'a> {
    /// Join handle dispatching onto `pool`.
    pub fn new(pool: &'a WorkerPool) -> Self {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        Self { pool, results_tx, results_rx, outstanding: 0 }
    }

    /// Dispatch the bloom for the receipt at `index`.
    pub fn schedule(&mut self, index: usize, logs: Vec<Log>) {
        self.outstanding += 1;
        let results = self.results_tx.clone();
        self.pool.submit(move || {
            let _ = results.send((index, logs_bloom(&logs)));
        });
    }

    /// Barrier: wait for every dispatched task and write the blooms into
    /// `receipts`.
    pub fn join(&mut self, receipts: &mut [Receipt]) {
        while self.outstanding > 0 {
            if let Ok((index, bloom)) = self.results_rx.recv()
                && let Some(receipt) = receipts.get_mut(index)
            {
                receipt.bloom = bloom;
            }
            self.outstanding -= 1;
        }
    }

    /// Barrier for early exits: wait for every dispatched task without
    /// keeping the results.
    pub fn drain(&mut self) {
        while self.outstanding > 0 {
            let _ = self.results_rx.recv();
            self.outstanding -= 1;
        }
    }
}

impl fmt::Debug for BloomJoin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomJoin").field("outstanding", &self.outstanding).finish()
    }
}
