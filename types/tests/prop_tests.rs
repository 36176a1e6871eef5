use proptest::prelude::*;

use gateway_types::{LifecycleEvent, MempoolStatus, Timestamp, TxHash};

fn event() -> impl Strategy<Value = LifecycleEvent> {
    prop_oneof![
        Just(LifecycleEvent::SeenInMempool),
        Just(LifecycleEvent::SubmittedToGateway),
        Just(LifecycleEvent::DroppedFromMempools),
        Just(LifecycleEvent::ResubmissionWindowExhausted),
        Just(LifecycleEvent::ResubmissionAccepted),
        any::<bool>().prop_map(|ledger_caught_up| LifecycleEvent::ResubmissionConflict {
            ledger_caught_up
        }),
        Just(LifecycleEvent::ResubmissionRejected),
        Just(LifecycleEvent::ResubmissionInconclusive),
        Just(LifecycleEvent::CommittedOnLedger),
    ]
}

fn replay(events: &[LifecycleEvent]) -> Vec<MempoolStatus> {
    let mut status = MempoolStatus::InNodeMempool;
    let mut path = vec![status];
    for event in events {
        status = status.transition(*event).0;
        path.push(status);
    }
    path
}

proptest! {
    /// Replaying the same observation history yields the same status.
    #[test]
    fn lifecycle_is_deterministic(events in prop::collection::vec(event(), 0..40)) {
        prop_assert_eq!(replay(&events), replay(&events));
    }

    /// No history reaches Failed straight from InNodeMempool.
    #[test]
    fn failed_is_never_entered_from_in_node_mempool(events in prop::collection::vec(event(), 0..40)) {
        let path = replay(&events);
        for pair in path.windows(2) {
            if pair[1] == MempoolStatus::Failed && pair[0] != MempoolStatus::Failed {
                prop_assert_ne!(pair[0], MempoolStatus::InNodeMempool);
            }
        }
    }

    /// Committed is terminal: nothing but another commit follows it.
    #[test]
    fn committed_is_absorbing(events in prop::collection::vec(event(), 0..40)) {
        let mut status = MempoolStatus::Committed;
        for event in events {
            status = status.transition(event).0;
            prop_assert_eq!(status, MempoolStatus::Committed);
        }
    }

    /// A failure reason is produced exactly when a transition enters Failed.
    #[test]
    fn failure_reason_accompanies_failure(events in prop::collection::vec(event(), 1..40)) {
        let mut status = MempoolStatus::InNodeMempool;
        for event in events {
            let (next, reason) = status.transition(event);
            let entered_failed = next == MempoolStatus::Failed && status != MempoolStatus::Failed;
            prop_assert_eq!(reason.is_some(), entered_failed);
            status = next;
        }
    }

    /// Timestamp ordering matches the underlying milliseconds.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::from_millis(a);
        let tb = Timestamp::from_millis(b);
        prop_assert_eq!(ta <= tb, a <= b);
    }

    /// TxHash hex encoding parses back to the same hash.
    #[test]
    fn tx_hash_hex_parses_back(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(TxHash::from_hex(&hash.to_string()).unwrap(), hash);
    }
}
