//! LMDB implementation of MempoolStore.
//!
//! Key format: the 32-byte transaction id. Queries scan the whole database;
//! the tracked set is bounded by pruning.

use std::collections::BTreeMap;

use heed::RoTxn;

use gateway_store::{
    MempoolStore, MergePolicy, PruneCriteria, ResubmissionBatch, ResubmissionCriteria,
    StoreError, UpsertReport,
};
use gateway_types::{MempoolStatus, MempoolTransaction, TxHash};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::LmdbError;

impl LmdbEnvironment {
    fn all_mempool_in(&self, txn: &RoTxn<'_>) -> Result<Vec<MempoolTransaction>, LmdbError> {
        let mut rows = Vec::new();
        for entry in self.mempool_db.iter(txn)? {
            let (_, bytes) = entry?;
            rows.push(decode(bytes)?);
        }
        Ok(rows)
    }

    fn all_mempool(&self) -> Result<Vec<MempoolTransaction>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        self.all_mempool_in(&rtxn)
    }
}

impl MempoolStore for LmdbEnvironment {
    fn upsert_mempool_transactions(
        &self,
        transactions: &[MempoolTransaction],
        policy: MergePolicy,
    ) -> Result<UpsertReport, StoreError> {
        let mut report = UpsertReport::default();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        for incoming in transactions {
            let key = incoming.id.as_bytes();
            let existing: Option<MempoolTransaction> = self
                .mempool_db
                .get(&wtxn, key)
                .map_err(LmdbError::from)?
                .map(decode)
                .transpose()?;

            if let Some(merged) = policy.merge(existing.as_ref(), incoming) {
                let value = encode(&merged)?;
                self.mempool_db
                    .put(&mut wtxn, key, &value)
                    .map_err(LmdbError::from)?;
                if existing.is_some() {
                    report.updated += 1;
                } else {
                    report.inserted += 1;
                }
            }
        }

        wtxn.commit().map_err(LmdbError::from)?;
        Ok(report)
    }

    fn mempool_transaction(&self, id: &TxHash) -> Result<Option<MempoolTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let tx: Option<MempoolTransaction> = self
            .mempool_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .map(decode)
            .transpose()?;
        Ok(tx)
    }

    fn mempool_transactions_with_status(
        &self,
        statuses: &[MempoolStatus],
    ) -> Result<Vec<MempoolTransaction>, StoreError> {
        Ok(self
            .all_mempool()?
            .into_iter()
            .filter(|tx| statuses.contains(&tx.status))
            .collect())
    }

    fn mempool_transactions_needing_resubmission(
        &self,
        criteria: &ResubmissionCriteria,
    ) -> Result<ResubmissionBatch, StoreError> {
        let rows = self.all_mempool()?;
        Ok(criteria.select(&rows))
    }

    fn prune_mempool_transactions(&self, criteria: &PruneCriteria) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let doomed: Vec<TxHash> = self
            .all_mempool_in(&wtxn)?
            .into_iter()
            .filter(|tx| criteria.matches(tx))
            .map(|tx| tx.id)
            .collect();

        for id in &doomed {
            self.mempool_db
                .delete(&mut wtxn, id.as_bytes())
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(doomed.len())
    }

    fn count_mempool_transactions_by_status(
        &self,
    ) -> Result<Vec<(MempoolStatus, usize)>, StoreError> {
        let mut counts: BTreeMap<&'static str, (MempoolStatus, usize)> = BTreeMap::new();
        for tx in self.all_mempool()? {
            counts.entry(tx.status.as_str()).or_insert((tx.status, 0)).1 += 1;
        }
        Ok(counts.into_values().collect())
    }
}
