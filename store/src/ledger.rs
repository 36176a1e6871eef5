//! Committed ledger storage trait.

use crate::StoreError;
use gateway_types::{
    CommittedTransaction, ConsistentLedgerExtension, Timestamp, TransactionSummary,
};
use std::time::Duration;

/// Outcome of a successful [`LedgerStore::commit_extension`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub transactions_committed: usize,
    pub final_state_version: u64,
    /// Tracked mempool transactions moved to `Committed` by this commit.
    pub mempool_transactions_committed: usize,
    /// Time spent inside the storage transaction.
    pub write_duration: Duration,
}

/// Durable committed ledger.
///
/// There is at most one writer: the ledger confirmation loop.
pub trait LedgerStore: Send + Sync {
    /// The summary of the last committed transaction, or the pre-genesis
    /// summary for an empty ledger.
    fn read_committed_tip(&self) -> Result<TransactionSummary, StoreError>;

    /// Atomically append `extension` on top of `parent`.
    ///
    /// The current tip is re-read inside the same storage transaction and must
    /// equal `parent`, otherwise nothing is written and
    /// [`StoreError::CommitPreconditionFailed`] is returned. Tracked mempool
    /// transactions whose id matches a committed transaction are marked
    /// committed in the same transaction.
    fn commit_extension(
        &self,
        parent: &TransactionSummary,
        extension: &ConsistentLedgerExtension,
        committed_at: Timestamp,
    ) -> Result<CommitReport, StoreError>;

    fn committed_transaction(
        &self,
        state_version: u64,
    ) -> Result<Option<CommittedTransaction>, StoreError>;
}

/// Check that `current` (the durable tip) is the parent `extension` was built on.
pub fn check_commit_precondition(
    current: &TransactionSummary,
    parent: &TransactionSummary,
    extension: &ConsistentLedgerExtension,
) -> Result<(), StoreError> {
    if extension.parent.state_version != parent.state_version
        || extension.parent.accumulator_hash != parent.accumulator_hash
    {
        return Err(StoreError::CommitPreconditionFailed(format!(
            "extension built on state version {} but committed against {}",
            extension.parent.state_version, parent.state_version
        )));
    }
    if current.state_version != parent.state_version {
        return Err(StoreError::CommitPreconditionFailed(format!(
            "expected committed tip at state version {}, found {}",
            parent.state_version, current.state_version
        )));
    }
    if current.accumulator_hash != parent.accumulator_hash {
        return Err(StoreError::CommitPreconditionFailed(format!(
            "accumulator at state version {} is {}, expected {}",
            current.state_version, current.accumulator_hash, parent.accumulator_hash
        )));
    }
    Ok(())
}
