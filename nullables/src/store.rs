//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use gateway_store::{
    check_commit_precondition, CommitReport, LedgerStore, MempoolStore, MergePolicy,
    PruneCriteria, ResubmissionBatch, ResubmissionCriteria, StoreError, UpsertReport,
};
use gateway_types::{
    CommittedTransaction, ConsistentLedgerExtension, MempoolStatus, MempoolTransaction,
    Timestamp, TransactionSummary, TxHash,
};

#[derive(Default)]
struct Tables {
    ledger: BTreeMap<u64, CommittedTransaction>,
    mempool: HashMap<TxHash, MempoolTransaction>,
}

/// An in-memory ledger + mempool store for testing.
/// One lock covers both tables, so every call is atomic like a real
/// storage transaction.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
    fail_lifecycle_writes: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail with a backend error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make every following `LifecycleTransition` upsert fail with a backend error.
    pub fn fail_lifecycle_writes(&self, fail: bool) {
        self.fail_lifecycle_writes.store(fail, Ordering::SeqCst);
    }

    pub fn committed_count(&self) -> usize {
        self.tables.lock().unwrap().ledger.len()
    }

    /// Every tracked mempool row, ordered by id.
    pub fn mempool_rows(&self) -> Vec<MempoolTransaction> {
        let mut rows: Vec<_> = self.tables.lock().unwrap().mempool.values().cloned().collect();
        rows.sort_by_key(|tx| tx.id);
        rows
    }

    /// Write a row as-is, bypassing merge policies.
    pub fn put_mempool_transaction(&self, tx: MempoolTransaction) {
        self.tables.lock().unwrap().mempool.insert(tx.id, tx);
    }
}

impl LedgerStore for NullStore {
    fn read_committed_tip(&self) -> Result<TransactionSummary, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .ledger
            .values()
            .next_back()
            .map_or_else(TransactionSummary::pre_genesis, |tx| tx.summary.clone()))
    }

    fn commit_extension(
        &self,
        parent: &TransactionSummary,
        extension: &ConsistentLedgerExtension,
        committed_at: Timestamp,
    ) -> Result<CommitReport, StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("commit failure injected".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();

        let current = tables
            .ledger
            .values()
            .next_back()
            .map_or_else(TransactionSummary::pre_genesis, |tx| tx.summary.clone());
        check_commit_precondition(&current, parent, extension)?;

        let mut mempool_transactions_committed = 0;
        for tx in &extension.transactions {
            tables.ledger.insert(tx.summary.state_version, tx.clone());
            if let Some(tracked) = tables.mempool.get_mut(&tx.summary.transaction_hash) {
                tracked.mark_committed(tx.summary.state_version, committed_at);
                tracked.revision = tracked.revision.wrapping_add(1);
                mempool_transactions_committed += 1;
            }
        }

        Ok(CommitReport {
            transactions_committed: extension.len(),
            final_state_version: extension.final_summary().state_version,
            mempool_transactions_committed,
            write_duration: Duration::ZERO,
        })
    }

    fn committed_transaction(
        &self,
        state_version: u64,
    ) -> Result<Option<CommittedTransaction>, StoreError> {
        Ok(self.tables.lock().unwrap().ledger.get(&state_version).cloned())
    }
}

impl MempoolStore for NullStore {
    fn upsert_mempool_transactions(
        &self,
        transactions: &[MempoolTransaction],
        policy: MergePolicy,
    ) -> Result<UpsertReport, StoreError> {
        if policy == MergePolicy::LifecycleTransition
            && self.fail_lifecycle_writes.load(Ordering::SeqCst)
        {
            return Err(StoreError::Backend("lifecycle write failure injected".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        let mut report = UpsertReport::default();
        for incoming in transactions {
            let existing = tables.mempool.get(&incoming.id);
            let is_update = existing.is_some();
            if let Some(merged) = policy.merge(existing, incoming) {
                tables.mempool.insert(merged.id, merged);
                if is_update {
                    report.updated += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }
        Ok(report)
    }

    fn mempool_transaction(&self, id: &TxHash) -> Result<Option<MempoolTransaction>, StoreError> {
        Ok(self.tables.lock().unwrap().mempool.get(id).cloned())
    }

    fn mempool_transactions_with_status(
        &self,
        statuses: &[MempoolStatus],
    ) -> Result<Vec<MempoolTransaction>, StoreError> {
        Ok(self
            .mempool_rows()
            .into_iter()
            .filter(|tx| statuses.contains(&tx.status))
            .collect())
    }

    fn mempool_transactions_needing_resubmission(
        &self,
        criteria: &ResubmissionCriteria,
    ) -> Result<ResubmissionBatch, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(criteria.select(tables.mempool.values()))
    }

    fn prune_mempool_transactions(&self, criteria: &PruneCriteria) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.mempool.len();
        tables.mempool.retain(|_, tx| !criteria.matches(tx));
        Ok(before - tables.mempool.len())
    }

    fn count_mempool_transactions_by_status(
        &self,
    ) -> Result<Vec<(MempoolStatus, usize)>, StoreError> {
        let mut counts: BTreeMap<&'static str, (MempoolStatus, usize)> = BTreeMap::new();
        for tx in self.tables.lock().unwrap().mempool.values() {
            counts.entry(tx.status.as_str()).or_insert((tx.status, 0)).1 += 1;
        }
        Ok(counts.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{CommittedTransactionRecord, NodeName};

    fn extension_of(parent: TransactionSummary, id: u8) -> ConsistentLedgerExtension {
        let summary = TransactionSummary {
            state_version: parent.state_version + 1,
            transaction_hash: TxHash::new([id; 32]),
            ..parent.clone()
        };
        ConsistentLedgerExtension {
            parent,
            transactions: vec![CommittedTransaction {
                record: CommittedTransactionRecord {
                    state_version: summary.state_version,
                    transaction_hash: summary.transaction_hash,
                    accumulator_hash: summary.accumulator_hash,
                    payload: vec![id],
                    new_epoch: None,
                    round_timestamp: None,
                    reporting_node: NodeName::new("a").unwrap(),
                },
                summary,
            }],
        }
    }

    #[test]
    fn commit_marks_tracked_transactions() {
        let store = NullStore::new();
        store.put_mempool_transaction(MempoolTransaction::observed(
            TxHash::new([1; 32]),
            vec![1],
            Timestamp::from_secs(1),
        ));
        let genesis = TransactionSummary::pre_genesis();
        let report = store
            .commit_extension(&genesis, &extension_of(genesis.clone(), 1), Timestamp::from_secs(2))
            .unwrap();
        assert_eq!(report.mempool_transactions_committed, 1);
        assert_eq!(store.read_committed_tip().unwrap().state_version, 1);
        assert_eq!(store.mempool_rows()[0].status, MempoolStatus::Committed);
    }

    #[test]
    fn stale_parent_is_rejected() {
        let store = NullStore::new();
        let genesis = TransactionSummary::pre_genesis();
        store
            .commit_extension(&genesis, &extension_of(genesis.clone(), 1), Timestamp::EPOCH)
            .unwrap();
        let err = store
            .commit_extension(&genesis, &extension_of(genesis.clone(), 2), Timestamp::EPOCH)
            .unwrap_err();
        assert!(matches!(err, StoreError::CommitPreconditionFailed(_)));
        assert_eq!(store.committed_count(), 1);
    }
}
