//! Integration tests driving the full gateway:
//! node reports → quorum → commit → mempool tracking → resubmission → pruning.
//!
//! Services are wired to nullable clock, store and submitter so every tick is
//! deterministic; one test swaps in the LMDB backend to check persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gateway_consensus::QuorumStatus;
use gateway_crypto::{hash_transaction, next_accumulator};
use gateway_mempool::{MempoolEntry, NodeMempoolSnapshot, Rejection, Resolution, SubmitError};
use gateway_node::{ErrorSeverity, Gateway, GatewayConfig, GatewayError, NodeConfig};
use gateway_nullables::{NullClock, NullStore, NullSubmitter};
use gateway_store::{LedgerStore, MempoolStore};
use gateway_store_lmdb::LmdbEnvironment;
use gateway_types::{
    AccumulatorHash, Clock, CommittedTransactionRecord, FailureReason, MempoolStatus, NodeLedgerTip,
    NodeName, Timestamp,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const START_SECS: u64 = 1_700_000_000;

fn name(s: &str) -> NodeName {
    NodeName::new(s).unwrap()
}

fn node(n: &str, trust: f64) -> NodeConfig {
    NodeConfig {
        name: n.to_string(),
        core_api_url: format!("http://{n}:3333/core"),
        trust_weighting: trust,
        request_weighting: 1.0,
        enabled: true,
        disabled_for_transaction_indexing: false,
        disabled_for_submission: false,
    }
}

fn config(nodes: Vec<NodeConfig>, proportion: f64) -> GatewayConfig {
    let mut config = GatewayConfig {
        nodes,
        ..Default::default()
    };
    config.ledger_confirmation.quorum_requires_trust_proportion = proportion;
    config
}

/// A valid chain on top of pre-genesis carrying `payloads`.
fn chain(payloads: &[&[u8]], round_timestamp: Timestamp) -> Vec<CommittedTransactionRecord> {
    let mut parent = AccumulatorHash::ZERO;
    payloads
        .iter()
        .enumerate()
        .map(|(i, payload)| {
            let transaction_hash = hash_transaction(payload);
            let accumulator_hash = next_accumulator(&parent, &transaction_hash);
            parent = accumulator_hash;
            CommittedTransactionRecord {
                state_version: i as u64 + 1,
                transaction_hash,
                accumulator_hash,
                payload: payload.to_vec(),
                new_epoch: (i == 0).then_some(1),
                round_timestamp: Some(round_timestamp),
                reporting_node: name("unset"),
            }
        })
        .collect()
}

fn report(gateway: &Gateway, node: &str, records: Vec<CommittedTransactionRecord>) {
    let last = records.last().expect("non-empty report");
    gateway
        .report_ledger_tip(NodeLedgerTip {
            node: name(node),
            state_version: last.state_version,
            accumulator_hash: last.accumulator_hash,
        })
        .unwrap();
    gateway.report_transactions(&name(node), records).unwrap();
}

fn snapshot(node: &str, at: Timestamp, payloads: &[&[u8]]) -> NodeMempoolSnapshot {
    NodeMempoolSnapshot {
        node: name(node),
        observed_at: at,
        transactions: payloads
            .iter()
            .map(|p| {
                (
                    hash_transaction(p),
                    MempoolEntry {
                        payload: p.to_vec(),
                        first_seen: at,
                    },
                )
            })
            .collect::<HashMap<_, _>>(),
    }
}

struct Harness {
    gateway: Gateway,
    store: Arc<NullStore>,
    clock: Arc<NullClock>,
    submitter: Arc<NullSubmitter>,
}

fn harness(config: GatewayConfig) -> Harness {
    let store = Arc::new(NullStore::new());
    let clock = Arc::new(NullClock::from_secs(START_SECS));
    let submitter = Arc::new(NullSubmitter::new());
    let gateway = Gateway::new(config, store.clone(), submitter.clone(), clock.clone()).unwrap();
    Harness {
        gateway,
        store,
        clock,
        submitter,
    }
}

/// Record a local submission to node `a` and let it drop out of node `a`'s mempool.
fn submit_and_drop(h: &Harness, payload: &[u8]) {
    h.gateway
        .record_local_submission(payload.to_vec(), name("a"))
        .unwrap();
    h.clock.advance(Duration::from_secs(6));
    h.gateway
        .report_mempool_snapshot(snapshot("a", h.clock.now(), &[]))
        .unwrap();
    assert_eq!(h.gateway.run_mempool_tick().unwrap().marked_missing, 1);
    h.clock.advance(Duration::from_secs(10));
}

// ---------------------------------------------------------------------------
// Ledger confirmation
// ---------------------------------------------------------------------------

#[test]
fn agreeing_pair_outvotes_heavier_single_node() {
    // Trust 1, 1, 1.5; quorum needs half of 3.5.
    let h = harness(config(vec![node("a", 1.0), node("b", 1.0), node("c", 1.5)], 0.5));
    let ts = Timestamp::from_secs(START_SECS);
    report(&h.gateway, "a", chain(&[b"x"], ts));
    report(&h.gateway, "b", chain(&[b"x"], ts));
    report(&h.gateway, "c", chain(&[b"y"], ts));

    let cycle = h.gateway.run_ledger_cycle().unwrap();
    assert_eq!(cycle.status, QuorumStatus::Extended { count: 1 });
    let committed = h.store.committed_transaction(1).unwrap().unwrap();
    assert_eq!(committed.record.payload, b"x".to_vec());

    let metrics = h.gateway.metrics();
    assert_eq!(metrics.node_consistent.with_label_values(&["c"]).get(), 0.0);
    assert_eq!(metrics.node_consistent.with_label_values(&["a"]).get(), 1.0);
}

#[test]
fn single_reporter_cannot_extend_alone() {
    let h = harness(config(vec![node("a", 1.0), node("b", 1.0), node("c", 2.0)], 0.5));
    let ts = Timestamp::from_secs(START_SECS);
    report(&h.gateway, "a", chain(&[b"x", b"z"], ts));
    report(&h.gateway, "b", chain(&[b"x"], ts));
    report(&h.gateway, "c", chain(&[b"x"], ts));

    let cycle = h.gateway.run_ledger_cycle().unwrap();
    assert_eq!(cycle.committed_tip, 1);
    assert_eq!(h.gateway.committed_tip().state_version, 1);
    assert_eq!(h.gateway.requested_range(&name("a")).unwrap(), Some((2, 3001)));
}

#[test]
fn irreconcilable_split_raises_the_quorum_alarm() {
    let h = harness(config(vec![node("a", 1.0), node("b", 1.0), node("c", 1.0)], 0.75));
    let ts = Timestamp::from_secs(START_SECS);
    report(&h.gateway, "a", chain(&[b"x"], ts));
    report(&h.gateway, "b", chain(&[b"y"], ts));
    report(&h.gateway, "c", chain(&[b"z"], ts));

    let cycle = h.gateway.run_ledger_cycle().unwrap();
    assert_eq!(cycle.status, QuorumStatus::Unreachable);
    assert_eq!(cycle.transactions_committed, 0);
    assert_eq!(h.gateway.metrics().quorum_exists.get(), 0.0);
    assert_eq!(h.store.committed_count(), 0);
}

#[test]
fn forged_payload_is_a_structural_failure() {
    let h = harness(config(vec![node("a", 1.0), node("b", 1.0)], 0.51));
    let mut records = chain(&[b"x", b"y"], Timestamp::from_secs(START_SECS));
    records[1].payload = b"tampered".to_vec();
    report(&h.gateway, "a", records.clone());
    report(&h.gateway, "b", records);

    let err = h.gateway.run_ledger_cycle().unwrap_err();
    assert_eq!(err.severity(), ErrorSeverity::Structural);
    assert_eq!(h.store.committed_count(), 0);
    assert_eq!(h.gateway.committed_tip().state_version, 0);
}

#[test]
fn transactions_require_a_reported_tip() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    let err = h
        .gateway
        .report_transactions(&name("a"), chain(&[b"x"], Timestamp::EPOCH))
        .unwrap_err();
    assert!(matches!(err, GatewayError::Consensus(_)));
}

#[test]
fn commit_marks_local_submission_committed() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    let id = h
        .gateway
        .record_local_submission(b"mine".to_vec(), name("a"))
        .unwrap();

    report(&h.gateway, "a", chain(&[b"other", b"mine"], h.clock.now()));
    let cycle = h.gateway.run_ledger_cycle().unwrap();
    assert_eq!(cycle.mempool_transactions_committed, 1);

    let row = h.store.mempool_transaction(&id).unwrap().unwrap();
    assert_eq!(row.status, MempoolStatus::Committed);
    assert_eq!(row.committed_state_version, Some(2));
}

// ---------------------------------------------------------------------------
// Mempool tracking
// ---------------------------------------------------------------------------

#[test]
fn no_fresh_snapshots_is_a_precondition_failure() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    let err = h.gateway.run_mempool_tick().unwrap_err();
    assert_eq!(err.severity(), ErrorSeverity::Precondition);
}

#[test]
fn grace_period_shields_fresh_submissions() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    let id = h
        .gateway
        .record_local_submission(b"fresh".to_vec(), name("a"))
        .unwrap();

    h.clock.advance(Duration::from_secs(2));
    h.gateway
        .report_mempool_snapshot(snapshot("a", h.clock.now(), &[]))
        .unwrap();
    h.gateway.run_mempool_tick().unwrap();
    let row = h.store.mempool_transaction(&id).unwrap().unwrap();
    assert_eq!(row.status, MempoolStatus::InNodeMempool);

    h.clock.advance(Duration::from_secs(4));
    h.gateway
        .report_mempool_snapshot(snapshot("a", h.clock.now(), &[]))
        .unwrap();
    h.gateway.run_mempool_tick().unwrap();
    let row = h.store.mempool_transaction(&id).unwrap().unwrap();
    assert_eq!(row.status, MempoolStatus::Missing);
}

// ---------------------------------------------------------------------------
// Resubmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_transaction_is_resubmitted_and_accepted() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    submit_and_drop(&h, b"retry-me");

    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.queue_size, 1);
    assert_eq!(report.count(Resolution::Accepted), 1);
    assert_eq!(h.submitter.calls(), vec![(name("a"), b"retry-me".to_vec())]);

    let row = h
        .store
        .mempool_transaction(&hash_transaction(b"retry-me"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, MempoolStatus::InNodeMempool);
    assert_eq!(row.submission_count, 2);

    // Just resubmitted: not due again.
    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.queue_size, 0);
}

#[tokio::test]
async fn conflict_while_ledger_lags_is_resolved_but_unknown() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    submit_and_drop(&h, b"ambiguous");
    h.submitter.push_outcome(Err(SubmitError::Rejected(Rejection::SubstateConflict(
        "substate consumed".to_string(),
    ))));

    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.count(Resolution::ResolvedButUnknown), 1);

    let row = h
        .store
        .mempool_transaction(&hash_transaction(b"ambiguous"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, MempoolStatus::ResolvedButUnknown);
    assert_eq!(row.failure, None);

    // The ledger is not synced up, so it is not picked again.
    h.clock.advance(Duration::from_secs(30));
    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.queue_size, 0);
}

#[tokio::test]
async fn conflict_after_ledger_caught_up_is_a_double_spend() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    submit_and_drop(&h, b"spent");

    report(&h.gateway, "a", chain(&[b"rival"], h.clock.now()));
    h.gateway.run_ledger_cycle().unwrap();

    h.submitter.push_outcome(Err(SubmitError::Rejected(Rejection::SubstateConflict(
        "substate consumed".to_string(),
    ))));
    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.count(Resolution::DoubleSpend), 1);

    let row = h
        .store
        .mempool_transaction(&hash_transaction(b"spent"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, MempoolStatus::Failed);
    assert_eq!(row.failure_reason(), Some(FailureReason::DoubleSpend));
}

#[tokio::test]
async fn exhausted_window_fails_without_a_network_call() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    submit_and_drop(&h, b"too-late");
    h.clock.advance(Duration::from_secs(300));

    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.failed_timeout, 1);
    assert!(h.submitter.calls().is_empty());

    let row = h
        .store
        .mempool_transaction(&hash_transaction(b"too-late"))
        .unwrap()
        .unwrap();
    assert_eq!(row.failure_reason(), Some(FailureReason::Timeout));
}

#[tokio::test]
async fn no_submission_node_is_a_precondition_failure() {
    let mut only = node("a", 1.0);
    only.disabled_for_submission = true;
    let h = harness(config(vec![only], 0.51));
    submit_and_drop(&h, b"stranded");

    let err = h.gateway.run_resubmission_tick().await.unwrap_err();
    assert_eq!(err.severity(), ErrorSeverity::Precondition);
    assert!(h.submitter.calls().is_empty());
}

#[tokio::test]
async fn transport_failure_leaves_transaction_missing() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    submit_and_drop(&h, b"flaky");
    h.submitter
        .push_outcome(Err(SubmitError::Transport("connection reset".to_string())));

    let report = h.gateway.run_resubmission_tick().await.unwrap();
    assert_eq!(report.count(Resolution::Inconclusive), 1);
    let row = h
        .store
        .mempool_transaction(&hash_transaction(b"flaky"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, MempoolStatus::Missing);
    assert_eq!(row.submission_count, 2);
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

#[test]
fn committed_rows_are_pruned_once_old() {
    let h = harness(config(vec![node("a", 1.0)], 0.51));
    let id = h
        .gateway
        .record_local_submission(b"done".to_vec(), name("a"))
        .unwrap();
    report(&h.gateway, "a", chain(&[b"done"], h.clock.now()));
    h.gateway.run_ledger_cycle().unwrap();

    assert_eq!(h.gateway.run_prune_tick().unwrap(), 0);

    // The ledger keeps up while time passes.
    h.clock.advance(Duration::from_secs(30));
    report(&h.gateway, "a", chain(&[b"done", b"later"], h.clock.now()));
    h.gateway.run_ledger_cycle().unwrap();

    assert_eq!(h.gateway.run_prune_tick().unwrap(), 1);
    assert!(h.store.mempool_transaction(&id).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_and_stop_within_grace_period() {
    let mut config = config(vec![node("a", 1.0)], 0.51);
    config.ledger_confirmation_interval_ms = 5;
    config.mempool_tracker_interval_ms = 5;
    config.resubmission_interval_ms = 5;
    config.mempool_prune_interval_ms = 5;
    let mut h = harness(config);

    report(&h.gateway, "a", chain(&[b"x", b"y"], h.clock.now()));
    h.gateway.start();
    assert!(h.gateway.is_running());

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.gateway.stop().await.unwrap();
    assert!(!h.gateway.is_running());
    assert_eq!(h.store.committed_count(), 2);
}

#[test]
fn invalid_config_is_rejected() {
    let store = Arc::new(NullStore::new());
    let result = Gateway::new(
        config(vec![node("a", 1.0)], 1.5),
        store,
        Arc::new(NullSubmitter::new()),
        Arc::new(NullClock::from_secs(START_SECS)),
    );
    assert!(matches!(result, Err(GatewayError::Config(_))));
}

#[test]
fn lmdb_commits_survive_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ts = Timestamp::from_secs(START_SECS);

    {
        let env = Arc::new(LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).expect("open env"));
        let gateway = Gateway::new(
            config(vec![node("a", 1.0)], 0.51),
            env,
            Arc::new(NullSubmitter::new()),
            Arc::new(NullClock::from_secs(START_SECS)),
        )
        .unwrap();
        report(&gateway, "a", chain(&[b"one", b"two", b"three"], ts));
        assert_eq!(gateway.run_ledger_cycle().unwrap().committed_tip, 3);
    }

    let env = Arc::new(LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).expect("reopen env"));
    let tip = env.read_committed_tip().unwrap();
    assert_eq!(tip.state_version, 3);

    let gateway = Gateway::new(
        config(vec![node("a", 1.0)], 0.51),
        env,
        Arc::new(NullSubmitter::new()),
        Arc::new(NullClock::from_secs(START_SECS)),
    )
    .unwrap();
    assert_eq!(gateway.committed_tip().state_version, 3);
    assert_eq!(gateway.requested_range(&name("a")).unwrap(), Some((3, 3003)));
}
