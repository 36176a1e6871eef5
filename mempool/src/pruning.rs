//! Retention rules for tracked mempool transactions.

use gateway_store::PruneCriteria;
use gateway_types::Timestamp;

use crate::MempoolConfig;

/// What the pruner may delete at `now`.
///
/// Committed rows are only pruned once the committed ledger itself has
/// reached the cutoff, so that a lagging ledger never loses the rows it is
/// about to mark committed.
pub fn prune_criteria(
    now: Timestamp,
    ledger_round_timestamp: Timestamp,
    config: &MempoolConfig,
) -> PruneCriteria {
    let committed_cutoff = now.saturating_sub(config.prune_committed_after());
    PruneCriteria {
        committed_before: (ledger_round_timestamp >= committed_cutoff).then_some(committed_cutoff),
        last_gateway_submission_before: now
            .saturating_sub(config.prune_missing_after_last_gateway_submission()),
        first_seen_before: now.saturating_sub(config.prune_missing_after_first_seen()),
        dropped_before: now.saturating_sub(config.prune_requires_missing_for()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{MempoolTransaction, TxHash};

    const DAY: u64 = 24 * 60 * 60;

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn committed_rows_wait_for_the_ledger() {
        let config = MempoolConfig::default();
        let now = at(10 * DAY);
        let mut tx = MempoolTransaction::observed(TxHash::new([1; 32]), vec![], at(0));
        tx.mark_committed(5, now.saturating_sub(std::time::Duration::from_secs(60)));

        let lagging = prune_criteria(now, at(DAY), &config);
        assert_eq!(lagging.committed_before, None);
        assert!(!lagging.matches(&tx));

        let synced = prune_criteria(now, now, &config);
        assert!(synced.matches(&tx));
    }

    #[test]
    fn foreign_rows_need_age_and_absence() {
        let config = MempoolConfig::default();
        let now = at(10 * DAY);
        let criteria = prune_criteria(now, now, &config);

        let mut old = MempoolTransaction::observed(TxHash::new([1; 32]), vec![], at(DAY));
        assert!(!criteria.matches(&old));
        old.mark_missing(at(2 * DAY));
        assert!(criteria.matches(&old));

        let mut recent = MempoolTransaction::observed(TxHash::new([2; 32]), vec![], at(9 * DAY));
        recent.mark_missing(at(9 * DAY));
        assert!(!criteria.matches(&recent));
    }
}
