//! Tracked mempool transaction storage trait, merge policies and query criteria.
//!
//! Backends store whole [`MempoolTransaction`] rows keyed by id. The merge
//! and selection rules live here so that every backend applies them the same
//! way.

use crate::StoreError;
use gateway_types::{MempoolStatus, MempoolTransaction, Timestamp, TxHash};
use std::time::Duration;

/// How an upserted row is combined with the stored one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Seen in a node mempool: insert unknown rows, otherwise keep
    /// `first_seen`, refresh `last_seen` and move non-terminal rows back to
    /// `InNodeMempool`.
    ObservedInMempool,
    /// Submitted by this gateway: insert unknown rows, otherwise record the
    /// new gateway and node submission on the stored row.
    LocalSubmission,
    /// Lifecycle update computed from a previously read row. Only applies
    /// while the stored row is still at the revision the update was computed
    /// from, so a concurrent submission or observation is never overwritten.
    /// Never touches a terminal row (unless the update is a commit) and never
    /// resurrects a pruned row.
    LifecycleTransition,
}

impl MergePolicy {
    /// The row to write, or `None` when the stored row must stay as it is.
    pub fn merge(
        &self,
        existing: Option<&MempoolTransaction>,
        incoming: &MempoolTransaction,
    ) -> Option<MempoolTransaction> {
        match (self, existing) {
            (Self::ObservedInMempool | Self::LocalSubmission, None) => Some(incoming.clone()),
            (Self::LifecycleTransition, None) => None,

            (Self::ObservedInMempool, Some(existing)) => {
                let seen_at = incoming
                    .last_seen_in_mempool_at
                    .or(incoming.first_seen_in_mempool_at)?;
                let mut merged = existing.clone();
                merged.mark_seen(seen_at);
                (merged != *existing).then(|| merged.written_over(existing.revision))
            }

            (Self::LocalSubmission, Some(existing)) => {
                let mut merged = existing.clone();
                if let Some(at) = incoming.last_submitted_to_gateway_at {
                    merged.mark_submitted_to_gateway(at);
                }
                if let (Some(node), Some(at)) = (
                    incoming.last_submitted_to_node.clone(),
                    incoming.last_submitted_to_node_at,
                ) {
                    merged.mark_submitted_to_node(node, at);
                }
                Some(merged.written_over(existing.revision))
            }

            (Self::LifecycleTransition, Some(existing)) => {
                if incoming.status == MempoolStatus::Committed {
                    if existing.status == MempoolStatus::Committed {
                        return None;
                    }
                    let (Some(state_version), Some(at)) =
                        (incoming.committed_state_version, incoming.committed_at)
                    else {
                        return None;
                    };
                    let mut merged = existing.clone();
                    merged.mark_committed(state_version, at);
                    return Some(merged.written_over(existing.revision));
                }
                if existing.status.is_terminal() || incoming.revision != existing.revision {
                    return None;
                }
                (incoming != existing).then(|| incoming.clone().written_over(existing.revision))
            }
        }
    }
}

/// Rows written by one upsert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Which transactions are due for resubmission.
#[derive(Clone, Debug)]
pub struct ResubmissionCriteria {
    pub now: Timestamp,
    /// `ResolvedButUnknown` rows are only retried once the ledger is synced.
    pub include_resolved_but_unknown: bool,
    pub min_delay_since_dropped: Duration,
    pub min_delay_between_submissions: Duration,
    pub limit: usize,
}

impl ResubmissionCriteria {
    pub fn matches(&self, tx: &MempoolTransaction) -> bool {
        let status_ok = match tx.status {
            MempoolStatus::Missing => true,
            MempoolStatus::ResolvedButUnknown => self.include_resolved_but_unknown,
            _ => false,
        };
        status_ok
            && tx.submitted_by_this_gateway
            && tx
                .last_dropped_out_of_mempool_at
                .map_or(true, |t| t.has_expired(self.min_delay_since_dropped, self.now))
            && tx
                .last_submitted_to_node_at
                .map_or(true, |t| t.has_expired(self.min_delay_between_submissions, self.now))
    }

    /// Select up to `limit` matching rows, least recently submitted first.
    pub fn select<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a MempoolTransaction>,
    ) -> ResubmissionBatch {
        let mut matching: Vec<&MempoolTransaction> =
            rows.into_iter().filter(|tx| self.matches(tx)).collect();
        matching.sort_by_key(|tx| (tx.last_submitted_to_node_at, tx.id));
        ResubmissionBatch {
            total_matching: matching.len(),
            transactions: matching.into_iter().take(self.limit).cloned().collect(),
        }
    }
}

/// One tick's worth of resubmission candidates.
#[derive(Clone, Debug, Default)]
pub struct ResubmissionBatch {
    pub transactions: Vec<MempoolTransaction>,
    /// Matching rows including those beyond the batch limit.
    pub total_matching: usize,
}

/// Which rows the mempool pruner deletes.
#[derive(Clone, Debug)]
pub struct PruneCriteria {
    /// Committed rows committed before this instant. `None` while the ledger
    /// is not synced far enough to trust commit times.
    pub committed_before: Option<Timestamp>,
    /// Self-submitted rows last submitted to the gateway before this instant.
    pub last_gateway_submission_before: Timestamp,
    /// Rows observed from other gateways first seen before this instant.
    pub first_seen_before: Timestamp,
    /// Both rules above also require the row to have dropped out of the
    /// mempool before this instant.
    pub dropped_before: Timestamp,
}

impl PruneCriteria {
    pub fn matches(&self, tx: &MempoolTransaction) -> bool {
        match tx.status {
            MempoolStatus::Committed => match (self.committed_before, tx.committed_at) {
                (Some(cutoff), Some(at)) => at < cutoff,
                _ => false,
            },
            MempoolStatus::InNodeMempool => false,
            _ => {
                let dropped_long_ago = tx
                    .last_dropped_out_of_mempool_at
                    .map_or(false, |t| t < self.dropped_before);
                let stale = if tx.submitted_by_this_gateway {
                    tx.last_submitted_to_gateway_at
                        .map_or(false, |t| t < self.last_gateway_submission_before)
                } else {
                    tx.first_seen_in_mempool_at
                        .map_or(false, |t| t < self.first_seen_before)
                };
                dropped_long_ago && stale
            }
        }
    }
}

/// Durable store of tracked mempool transactions.
pub trait MempoolStore: Send + Sync {
    /// Merge `transactions` into the store in one atomic write.
    fn upsert_mempool_transactions(
        &self,
        transactions: &[MempoolTransaction],
        policy: MergePolicy,
    ) -> Result<UpsertReport, StoreError>;

    fn mempool_transaction(&self, id: &TxHash) -> Result<Option<MempoolTransaction>, StoreError>;

    fn mempool_transactions_with_status(
        &self,
        statuses: &[MempoolStatus],
    ) -> Result<Vec<MempoolTransaction>, StoreError>;

    fn mempool_transactions_needing_resubmission(
        &self,
        criteria: &ResubmissionCriteria,
    ) -> Result<ResubmissionBatch, StoreError>;

    /// Delete matching rows, returning how many were removed.
    fn prune_mempool_transactions(&self, criteria: &PruneCriteria) -> Result<usize, StoreError>;

    fn count_mempool_transactions_by_status(
        &self,
    ) -> Result<Vec<(MempoolStatus, usize)>, StoreError>;
}
