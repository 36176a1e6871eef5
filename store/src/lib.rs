//! Abstract storage traits for the gateway.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits. Each trait
//! method is one atomic unit of work: it either fully applies or leaves the
//! store untouched.

pub mod error;
pub mod ledger;
pub mod mempool;

pub use error::StoreError;
pub use ledger::{check_commit_precondition, CommitReport, LedgerStore};
pub use mempool::{
    MempoolStore, MergePolicy, PruneCriteria, ResubmissionBatch, ResubmissionCriteria,
    UpsertReport,
};
