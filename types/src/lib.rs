//! Fundamental types for the gateway synchronization core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! hashes, timestamps, node identities, committed ledger records and summaries,
//! tracked mempool transactions, and entity address classification.

pub mod address;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod mempool;
pub mod network;
pub mod node;
pub mod time;

pub use address::{EntityAddress, EntityKind};
pub use error::TypesError;
pub use hash::{AccumulatorHash, TxHash};
pub use ledger::{
    CommittedTransaction, CommittedTransactionRecord, ConsistentLedgerExtension,
    TransactionSummary,
};
pub use mempool::{FailureReason, LifecycleEvent, MempoolFailure, MempoolStatus, MempoolTransaction};
pub use network::NetworkId;
pub use node::{NodeLedgerTip, NodeName};
pub use time::{Clock, SystemClock, Timestamp};
