//! Lifecycle tracking for transactions that left every node mempool.

use std::collections::HashSet;

use gateway_types::{LifecycleEvent, MempoolStatus, MempoolTransaction, Timestamp, TxHash};

use crate::MempoolConfig;

/// Whether the resubmission budget of a self-submitted transaction is spent.
pub fn resubmission_window_exhausted(
    tx: &MempoolTransaction,
    now: Timestamp,
    config: &MempoolConfig,
) -> bool {
    tx.submitted_by_this_gateway
        && tx
            .last_submitted_to_gateway_at
            .is_some_and(|t| t.has_expired(config.stop_resubmitting_after(), now))
}

/// Whether a recent submission shields `tx` from being declared missing.
pub fn within_post_submission_grace(
    tx: &MempoolTransaction,
    now: Timestamp,
    config: &MempoolConfig,
) -> bool {
    tx.submitted_by_this_gateway
        && tx
            .last_submitted_to_node_at
            .is_some_and(|t| !t.has_expired(config.post_submission_grace_period(), now))
}

/// Updates for in-mempool transactions absent from the combined mempool.
#[derive(Clone, Debug, Default)]
pub struct MissingPlan {
    pub updates: Vec<MempoolTransaction>,
    pub marked_missing: usize,
    pub failed_timeout: usize,
}

/// Reclassify `in_mempool` rows that no fresh snapshot contains.
///
/// Foreign transactions simply go missing. Self-submitted ones go missing
/// unless just submitted, and fail once their resubmission window is spent;
/// failing still passes through `Missing`.
pub fn plan_missing(
    in_mempool: &[MempoolTransaction],
    present: &HashSet<TxHash>,
    now: Timestamp,
    config: &MempoolConfig,
) -> MissingPlan {
    let mut plan = MissingPlan::default();

    for tx in in_mempool {
        if tx.status != MempoolStatus::InNodeMempool || present.contains(&tx.id) {
            continue;
        }
        if within_post_submission_grace(tx, now, config) {
            continue;
        }

        let mut updated = tx.clone();
        updated.mark_missing(now);
        if resubmission_window_exhausted(&updated, now, config) {
            updated.record_outcome(
                LifecycleEvent::ResubmissionWindowExhausted,
                format!(
                    "dropped from all mempools more than {}s after its last submission",
                    config.stop_resubmitting_after_secs
                ),
                now,
            );
            plan.failed_timeout += 1;
        } else {
            plan.marked_missing += 1;
        }
        plan.updates.push(updated);
    }
    plan
}

/// How many awaiting-resubmission rows show up again in `present`.
pub fn count_reappeared(awaiting: &[MempoolTransaction], present: &HashSet<TxHash>) -> usize {
    awaiting
        .iter()
        .filter(|tx| tx.status.awaits_resubmission() && present.contains(&tx.id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{FailureReason, NodeName};

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn foreign(id: u8) -> MempoolTransaction {
        MempoolTransaction::observed(TxHash::new([id; 32]), vec![id], at(0))
    }

    fn own(id: u8, submitted: u64) -> MempoolTransaction {
        MempoolTransaction::submitted_locally(
            TxHash::new([id; 32]),
            vec![id],
            NodeName::new("a").unwrap(),
            at(submitted),
        )
    }

    #[test]
    fn present_transactions_stay() {
        let rows = [foreign(1)];
        let present = HashSet::from([TxHash::new([1; 32])]);
        let plan = plan_missing(&rows, &present, at(100), &MempoolConfig::default());
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn foreign_transactions_go_missing() {
        let plan = plan_missing(&[foreign(1)], &HashSet::new(), at(100), &MempoolConfig::default());
        assert_eq!(plan.marked_missing, 1);
        let tx = &plan.updates[0];
        assert_eq!(tx.status, MempoolStatus::Missing);
        assert_eq!(tx.last_dropped_out_of_mempool_at, Some(at(100)));
    }

    #[test]
    fn fresh_submissions_get_a_grace_period() {
        let config = MempoolConfig::default();
        let plan = plan_missing(&[own(1, 98)], &HashSet::new(), at(100), &config);
        assert!(plan.updates.is_empty());

        let plan = plan_missing(&[own(1, 90)], &HashSet::new(), at(100), &config);
        assert_eq!(plan.updates[0].status, MempoolStatus::Missing);
    }

    #[test]
    fn exhausted_window_fails_through_missing() {
        let config = MempoolConfig::default();
        let plan = plan_missing(&[own(1, 0)], &HashSet::new(), at(400), &config);
        assert_eq!(plan.failed_timeout, 1);
        let tx = &plan.updates[0];
        assert_eq!(tx.status, MempoolStatus::Failed);
        assert_eq!(tx.failure_reason(), Some(FailureReason::Timeout));
        assert_eq!(tx.last_dropped_out_of_mempool_at, Some(at(400)));
    }

    #[test]
    fn reappearance_is_counted_for_awaiting_rows_only() {
        let mut missing = foreign(1);
        missing.mark_missing(at(5));
        let rows = [missing, foreign(2)];
        let present = HashSet::from([TxHash::new([1; 32]), TxHash::new([2; 32])]);
        assert_eq!(count_reappeared(&rows, &present), 1);
    }
}
