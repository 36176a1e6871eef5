//! LMDB implementation of LedgerStore.
//!
//! Key format: `state_version.to_be_bytes()`, so the last entry of the
//! database is the committed tip.

use std::time::Instant;

use heed::RoTxn;

use gateway_store::{check_commit_precondition, CommitReport, LedgerStore, StoreError};
use gateway_types::{
    CommittedTransaction, ConsistentLedgerExtension, MempoolTransaction, Timestamp,
    TransactionSummary,
};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::LmdbError;

impl LmdbEnvironment {
    fn tip_in(&self, txn: &RoTxn<'_>) -> Result<TransactionSummary, LmdbError> {
        match self.ledger_db.last(txn)? {
            Some((_, bytes)) => {
                let tx: CommittedTransaction = decode(bytes)?;
                Ok(tx.summary)
            }
            None => Ok(TransactionSummary::pre_genesis()),
        }
    }
}

impl LedgerStore for LmdbEnvironment {
    fn read_committed_tip(&self) -> Result<TransactionSummary, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.tip_in(&rtxn)?)
    }

    fn commit_extension(
        &self,
        parent: &TransactionSummary,
        extension: &ConsistentLedgerExtension,
        committed_at: Timestamp,
    ) -> Result<CommitReport, StoreError> {
        let started = Instant::now();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        let current = self.tip_in(&wtxn)?;
        check_commit_precondition(&current, parent, extension)?;

        let mut mempool_transactions_committed = 0;
        for tx in &extension.transactions {
            let key = tx.summary.state_version.to_be_bytes();
            let value = encode(tx)?;
            self.ledger_db
                .put(&mut wtxn, &key, &value)
                .map_err(LmdbError::from)?;

            let id = tx.summary.transaction_hash;
            let tracked = self
                .mempool_db
                .get(&wtxn, id.as_bytes())
                .map_err(LmdbError::from)?
                .map(decode::<MempoolTransaction>)
                .transpose()?;
            if let Some(mut tracked) = tracked {
                tracked.mark_committed(tx.summary.state_version, committed_at);
                tracked.revision = tracked.revision.wrapping_add(1);
                let value = encode(&tracked)?;
                self.mempool_db
                    .put(&mut wtxn, id.as_bytes(), &value)
                    .map_err(LmdbError::from)?;
                mempool_transactions_committed += 1;
            }
        }

        wtxn.commit().map_err(LmdbError::from)?;

        let final_state_version = extension.final_summary().state_version;
        tracing::debug!(
            count = extension.len(),
            final_state_version,
            "committed ledger extension"
        );

        Ok(CommitReport {
            transactions_committed: extension.len(),
            final_state_version,
            mempool_transactions_committed,
            write_duration: started.elapsed(),
        })
    }

    fn committed_transaction(
        &self,
        state_version: u64,
    ) -> Result<Option<CommittedTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let tx: Option<CommittedTransaction> = self
            .ledger_db
            .get(&rtxn, &state_version.to_be_bytes())
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()?;
        Ok(tx)
    }
}
