#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/emberchain/ember/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod apply;
pub use apply::apply_transaction;

mod bloom;
pub use bloom::{BloomJoin, WorkerPool};

mod commit;
pub use commit::Commitment;

mod engine;
pub use engine::{ChainContext, ConsensusEngine, EngineError, ExtraValidator, Posa};

mod error;
pub use error::{ApplyError, ProcessError};

mod evm;
pub use evm::{BlockContext, Evm, EvmConfig, EvmError, EvmFactory, ExecutionResult, TxContext};

mod gas;
pub use gas::{GasPool, GasPoolError};

mod outcome;
pub use outcome::ProcessOutcome;

mod process;
pub use process::StateProcessor;

mod x402;
pub use x402::{X402_REGISTRY, X402Payload, X402Permit};
