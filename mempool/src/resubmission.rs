//! Resubmission rules: which transactions are due, where to send them and
//! how to read the answer.

use rand::seq::SliceRandom;
use rand::Rng;

use gateway_consensus::{NodeTrust, TrustRegistry};
use gateway_store::ResubmissionCriteria;
use gateway_types::{LifecycleEvent, MempoolTransaction, NodeName, Timestamp};

use crate::lifecycle::resubmission_window_exhausted;
use crate::submitter::{Rejection, SubmitAccepted, SubmitError};
use crate::MempoolConfig;

/// Whether the committed ledger is close enough to real time to trust that
/// anything committed by now is visible.
pub fn is_ledger_synced_up(ledger_round_timestamp: Timestamp, now: Timestamp, config: &MempoolConfig) -> bool {
    !ledger_round_timestamp.is_epoch() && !ledger_round_timestamp.has_expired(config.synced_up_window(), now)
}

/// Whether the ledger has certainly moved past `moment`, allowing for clock drift.
pub fn ledger_confidently_after(
    ledger_round_timestamp: Timestamp,
    moment: Timestamp,
    config: &MempoolConfig,
) -> bool {
    ledger_round_timestamp > moment.saturating_add(config.max_clock_drift())
}

/// Selection criteria for one tick.
///
/// `ResolvedButUnknown` rows are only retried once the ledger is synced up,
/// since until then a conflict may still be this transaction committing.
pub fn resubmission_criteria(now: Timestamp, ledger_synced_up: bool, config: &MempoolConfig) -> ResubmissionCriteria {
    ResubmissionCriteria {
        now,
        include_resolved_but_unknown: ledger_synced_up,
        min_delay_since_dropped: config.min_delay_between_missing_and_resubmission(),
        min_delay_between_submissions: config.min_delay_between_resubmissions(),
        limit: config.resubmission_batch_size,
    }
}

/// Split due transactions into those whose window ran out, already marked
/// failed, and those to submit.
pub fn split_expired(
    due: Vec<MempoolTransaction>,
    now: Timestamp,
    config: &MempoolConfig,
) -> (Vec<MempoolTransaction>, Vec<MempoolTransaction>) {
    let (mut expired, to_submit): (Vec<_>, Vec<_>) = due
        .into_iter()
        .partition(|tx| resubmission_window_exhausted(tx, now, config));
    for tx in &mut expired {
        tx.record_outcome(
            LifecycleEvent::ResubmissionWindowExhausted,
            format!(
                "not committed within {}s of its last submission to the gateway",
                config.stop_resubmitting_after_secs
            ),
            now,
        );
    }
    (expired, to_submit)
}

/// Pick a submission node at random, weighted by request weight.
pub fn pick_submission_node<R: Rng + ?Sized>(registry: &TrustRegistry, rng: &mut R) -> Option<NodeName> {
    let nodes: Vec<&NodeTrust> = registry.submission_nodes().collect();
    nodes
        .choose_weighted(rng, |node| node.request_weight)
        .ok()
        .map(|node| node.name.clone())
}

/// How one resubmission attempt resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    Accepted,
    Duplicate,
    DoubleSpend,
    ResolvedButUnknown,
    Rejected,
    Inconclusive,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::DoubleSpend => "double_spend",
            Self::ResolvedButUnknown => "resolved_but_unknown",
            Self::Rejected => "rejected",
            Self::Inconclusive => "inconclusive",
        }
    }
}

/// The lifecycle update for one resubmission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedOutcome {
    pub resolution: Resolution,
    pub event: LifecycleEvent,
    pub explanation: String,
}

/// Interpret a submission result for `tx`.
///
/// A substate conflict only counts as a double spend when the committed
/// ledger has confidently passed the moment `tx` dropped out of the
/// mempools; otherwise the conflict may be `tx` itself having committed.
pub fn classify_outcome(
    tx: &MempoolTransaction,
    result: &Result<SubmitAccepted, SubmitError>,
    ledger_round_timestamp: Timestamp,
    config: &MempoolConfig,
) -> ClassifiedOutcome {
    let (resolution, event, explanation) = match result {
        Ok(accepted) => (
            if accepted.duplicate {
                Resolution::Duplicate
            } else {
                Resolution::Accepted
            },
            LifecycleEvent::ResubmissionAccepted,
            String::new(),
        ),
        Err(SubmitError::Rejected(Rejection::SubstateConflict(message))) => {
            let ledger_caught_up = tx
                .last_dropped_out_of_mempool_at
                .is_some_and(|dropped| ledger_confidently_after(ledger_round_timestamp, dropped, config));
            (
                if ledger_caught_up {
                    Resolution::DoubleSpend
                } else {
                    Resolution::ResolvedButUnknown
                },
                LifecycleEvent::ResubmissionConflict { ledger_caught_up },
                message.clone(),
            )
        }
        Err(SubmitError::Rejected(Rejection::Permanent(message))) => {
            (Resolution::Rejected, LifecycleEvent::ResubmissionRejected, message.clone())
        }
        Err(err) => (
            Resolution::Inconclusive,
            LifecycleEvent::ResubmissionInconclusive,
            err.to_string(),
        ),
    };
    ClassifiedOutcome {
        resolution,
        event,
        explanation,
    }
}

/// Record a resubmission attempt to `node` and its outcome on `tx`.
pub fn apply_outcome(tx: &mut MempoolTransaction, node: NodeName, outcome: &ClassifiedOutcome, now: Timestamp) {
    tx.mark_submitted_to_node(node, now);
    tx.record_outcome(outcome.event, &outcome.explanation, now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{FailureReason, MempoolStatus, TxHash};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn node(name: &str) -> NodeName {
        NodeName::new(name).unwrap()
    }

    /// Submitted at `submitted`, dropped at `dropped`.
    fn missing(submitted: u64, dropped: u64) -> MempoolTransaction {
        let mut tx = MempoolTransaction::submitted_locally(TxHash::new([1; 32]), vec![1], node("a"), at(submitted));
        tx.mark_missing(at(dropped));
        tx
    }

    fn conflict() -> Result<SubmitAccepted, SubmitError> {
        Err(SubmitError::Rejected(Rejection::SubstateConflict("substate already consumed".into())))
    }

    #[test]
    fn selects_only_long_missing_transactions() {
        let config = MempoolConfig::default();
        let now = at(1_000);
        let criteria = resubmission_criteria(now, true, &config);

        let due = missing(900, 950);
        assert!(criteria.matches(&due));

        let mut just_sent = missing(900, 950);
        just_sent.mark_submitted_to_node(node("b"), now.saturating_sub(Duration::from_secs(1)));
        assert!(!criteria.matches(&just_sent));
    }

    #[test]
    fn resolved_but_unknown_waits_for_sync() {
        let config = MempoolConfig::default();
        let mut tx = missing(900, 950);
        tx.record_outcome(LifecycleEvent::ResubmissionConflict { ledger_caught_up: false }, "", at(960));
        assert_eq!(tx.status, MempoolStatus::ResolvedButUnknown);

        assert!(!resubmission_criteria(at(1_000), false, &config).matches(&tx));
        assert!(resubmission_criteria(at(1_000), true, &config).matches(&tx));
    }

    #[test]
    fn conflict_while_behind_is_not_a_failure() {
        let config = MempoolConfig::default();
        let now = at(10_000);
        let tx = missing(9_900, 9_950);
        // Ledger is three minutes behind real time.
        let ledger = now.saturating_sub(Duration::from_secs(180));

        assert!(!is_ledger_synced_up(ledger, now, &config));
        let outcome = classify_outcome(&tx, &conflict(), ledger, &config);
        assert_eq!(outcome.resolution, Resolution::ResolvedButUnknown);

        let mut tx = tx;
        apply_outcome(&mut tx, node("b"), &outcome, now);
        assert_eq!(tx.status, MempoolStatus::ResolvedButUnknown);
        assert_eq!(tx.failure, None);
    }

    #[test]
    fn conflict_after_catching_up_is_a_double_spend() {
        let config = MempoolConfig::default();
        let now = at(10_000);
        let mut tx = missing(9_900, 9_950);
        let outcome = classify_outcome(&tx, &conflict(), at(9_990), &config);
        assert_eq!(outcome.resolution, Resolution::DoubleSpend);

        apply_outcome(&mut tx, node("b"), &outcome, now);
        assert_eq!(tx.failure_reason(), Some(FailureReason::DoubleSpend));
        assert_eq!(tx.submission_count, 2);
    }

    #[test]
    fn drift_margin_keeps_borderline_conflicts_ambiguous() {
        let config = MempoolConfig::default();
        let tx = missing(9_900, 9_950);
        let ledger = at(9_950).saturating_add(Duration::from_millis(500));
        let outcome = classify_outcome(&tx, &conflict(), ledger, &config);
        assert_eq!(outcome.resolution, Resolution::ResolvedButUnknown);
    }

    #[test]
    fn transport_failures_are_inconclusive() {
        let config = MempoolConfig::default();
        let mut tx = missing(900, 950);
        for err in [SubmitError::Timeout, SubmitError::Transport("connection reset".into())] {
            let outcome = classify_outcome(&tx, &Err(err), at(990), &config);
            assert_eq!(outcome.resolution, Resolution::Inconclusive);
            apply_outcome(&mut tx, node("b"), &outcome, at(1_000));
            assert_eq!(tx.status, MempoolStatus::Missing);
        }
        assert_eq!(tx.submission_count, 3);
    }

    #[test]
    fn accepted_goes_back_to_mempool() {
        let config = MempoolConfig::default();
        let mut tx = missing(900, 950);
        let outcome = classify_outcome(&tx, &Ok(SubmitAccepted { duplicate: true }), at(990), &config);
        assert_eq!(outcome.resolution, Resolution::Duplicate);
        apply_outcome(&mut tx, node("b"), &outcome, at(1_000));
        assert_eq!(tx.status, MempoolStatus::InNodeMempool);
    }

    #[test]
    fn expired_transactions_fail_without_submission() {
        let config = MempoolConfig::default();
        let (expired, to_submit) = split_expired(vec![missing(0, 10), missing(900, 950)], at(1_000), &config);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].failure_reason(), Some(FailureReason::Timeout));
        assert_eq!(to_submit.len(), 1);
    }

    #[test]
    fn node_choice_follows_request_weights() {
        let registry = TrustRegistry::new(vec![
            NodeTrust {
                name: node("heavy"),
                trust_weight: 1.0,
                request_weight: 1.0,
                enabled: true,
                indexing_enabled: true,
                submission_enabled: true,
            },
            NodeTrust {
                name: node("off"),
                trust_weight: 1.0,
                request_weight: 5.0,
                enabled: true,
                indexing_enabled: true,
                submission_enabled: false,
            },
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(pick_submission_node(&registry, &mut rng), Some(node("heavy")));
        }
        assert_eq!(pick_submission_node(&TrustRegistry::default(), &mut rng), None);
    }
}
