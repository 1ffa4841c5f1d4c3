#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/emberchain/ember/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod block;
pub use block::Block;
// Re-export the header type used throughout the workspace
pub use alloy_consensus::Header;

mod config;
pub use config::ChainConfig;

mod log;
pub use log::Log;

mod receipt;
pub use receipt::{Receipt, ReceiptStatus, logs_bloom};

mod signer;
pub use signer::Signer;

mod tx;
pub use tx::{Message, Transaction, TransactionError, TxType, TxX402};
