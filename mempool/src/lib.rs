//! Mempool: tracking pending transactions across node mempools.
//!
//! Node snapshots are merged by the [`aggregator`], transactions that vanish
//! from every mempool are reclassified by the [`lifecycle`] rules, and
//! self-submitted ones are retried under the [`resubmission`] rules until
//! they commit, fail, or run out of time. Everything here is synchronous;
//! the node crate drives it on timers against a store.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pruning;
pub mod resubmission;
pub mod submitter;

pub use aggregator::{CombinedMempool, MempoolAggregator, MempoolEntry, NodeMempoolSnapshot};
pub use config::MempoolConfig;
pub use error::MempoolError;
pub use lifecycle::{
    count_reappeared, plan_missing, resubmission_window_exhausted, within_post_submission_grace,
    MissingPlan,
};
pub use pruning::prune_criteria;
pub use resubmission::{
    apply_outcome, classify_outcome, is_ledger_synced_up, ledger_confidently_after,
    pick_submission_node, resubmission_criteria, split_expired, ClassifiedOutcome, Resolution,
};
pub use submitter::{Rejection, SubmitAccepted, SubmitError, TransactionSubmitter};
