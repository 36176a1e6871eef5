//! Resubmission scheduler: retries self-submitted transactions that
//! dropped out of every node mempool.
//!
//! Each tick selects due transactions against one `now`, fails the ones
//! whose window ran out, submits the rest concurrently with a per-request
//! timeout, and writes every lifecycle update in a single upsert.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use gateway_consensus::TrustRegistry;
use gateway_mempool::{
    apply_outcome, classify_outcome, is_ledger_synced_up, pick_submission_node,
    resubmission_criteria, split_expired, MempoolConfig, MempoolError, Resolution,
    SubmitAccepted, SubmitError, TransactionSubmitter,
};
use gateway_store::{MempoolStore, MergePolicy};
use gateway_types::{Clock, MempoolTransaction, NodeName, TxHash};
use gateway_utils::{limited_info, LogLimiter};

use crate::ledger_confirmation::LedgerConfirmation;
use crate::metrics::GatewayMetrics;
use crate::tracing_spans::resubmission_span;
use crate::worker::PeriodicTask;
use crate::GatewayError;

const IDLE_LOG_WINDOW: Duration = Duration::from_secs(60);

/// What one resubmission tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResubmissionReport {
    /// Transactions due in total, before the batch limit.
    pub queue_size: usize,
    pub failed_timeout: usize,
    pub outcomes: Vec<(TxHash, Resolution)>,
}

impl ResubmissionReport {
    pub fn count(&self, resolution: Resolution) -> usize {
        self.outcomes.iter().filter(|(_, r)| *r == resolution).count()
    }
}

pub struct Resubmitter {
    registry: Arc<TrustRegistry>,
    config: MempoolConfig,
    store: Arc<dyn MempoolStore>,
    submitter: Arc<dyn TransactionSubmitter>,
    ledger: Arc<LedgerConfirmation>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
    token: CancellationToken,
    rng: Mutex<StdRng>,
    idle_log: LogLimiter,
}

impl Resubmitter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<TrustRegistry>,
        config: MempoolConfig,
        store: Arc<dyn MempoolStore>,
        submitter: Arc<dyn TransactionSubmitter>,
        ledger: Arc<LedgerConfirmation>,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
        token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            config,
            store,
            submitter,
            ledger,
            clock,
            metrics,
            token,
            rng: Mutex::new(StdRng::from_entropy()),
            idle_log: LogLimiter::new(IDLE_LOG_WINDOW),
        }
    }

    /// Use a fixed seed for node selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Pick a node for every transaction, or `None` if no node takes submissions.
    fn assign_nodes(
        &self,
        transactions: Vec<MempoolTransaction>,
    ) -> Option<Vec<(MempoolTransaction, NodeName)>> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        transactions
            .into_iter()
            .map(|tx| pick_submission_node(&self.registry, &mut *rng).map(|node| (tx, node)))
            .collect()
    }

    async fn submit_one(&self, node: &NodeName, payload: &[u8]) -> Result<SubmitAccepted, SubmitError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SubmitError::Transport("gateway shutting down".to_string())),
            result = tokio::time::timeout(
                self.config.submission_request_timeout(),
                self.submitter.submit(node, payload),
            ) => result.unwrap_or(Err(SubmitError::Timeout)),
        }
    }

    /// Run one resubmission tick.
    pub async fn run_tick(&self) -> Result<ResubmissionReport, GatewayError> {
        let now = self.clock.now();
        let ledger_round_timestamp = self.ledger.committed_tip().round_timestamp;
        let synced = is_ledger_synced_up(ledger_round_timestamp, now, &self.config);
        let criteria = resubmission_criteria(now, synced, &self.config);

        let batch = self.store.mempool_transactions_needing_resubmission(&criteria)?;
        self.metrics
            .resubmission_queue_size
            .set(batch.total_matching as i64);

        let mut report = ResubmissionReport {
            queue_size: batch.total_matching,
            ..Default::default()
        };
        if batch.transactions.is_empty() {
            limited_info!(self.idle_log, now, ledger_synced_up = synced, "no transactions need resubmission");
            return Ok(report);
        }

        let (mut updates, to_submit) = split_expired(batch.transactions, now, &self.config);
        report.failed_timeout = updates.len();
        self.metrics
            .mempool_failed_timeout
            .inc_by(report.failed_timeout as u64);

        let Some(assignments) = self.assign_nodes(to_submit) else {
            if !updates.is_empty() {
                self.store
                    .upsert_mempool_transactions(&updates, MergePolicy::LifecycleTransition)?;
            }
            return Err(MempoolError::NoSubmissionNode.into());
        };

        let span = resubmission_span(assignments.len());
        let results = join_all(
            assignments
                .iter()
                .map(|(tx, node)| self.submit_one(node, &tx.payload)),
        )
        .instrument(span)
        .await;
        self.metrics
            .resubmission_attempts
            .inc_by(assignments.len() as u64);

        for ((mut tx, node), result) in assignments.into_iter().zip(results) {
            let outcome = classify_outcome(&tx, &result, ledger_round_timestamp, &self.config);
            self.metrics
                .resubmission_resolutions
                .with_label_values(&[outcome.resolution.as_str()])
                .inc();
            debug!(
                transaction = %tx.id,
                node = %node,
                result = outcome.resolution.as_str(),
                explanation = %outcome.explanation,
                "resubmission resolved"
            );
            report.outcomes.push((tx.id, outcome.resolution));
            apply_outcome(&mut tx, node, &outcome, now);
            updates.push(tx);
        }

        self.store
            .upsert_mempool_transactions(&updates, MergePolicy::LifecycleTransition)?;

        info!(
            queue = report.queue_size,
            submitted = report.outcomes.len(),
            failed_timeout = report.failed_timeout,
            accepted = report.count(Resolution::Accepted) + report.count(Resolution::Duplicate),
            double_spend = report.count(Resolution::DoubleSpend),
            resolved_but_unknown = report.count(Resolution::ResolvedButUnknown),
            inconclusive = report.count(Resolution::Inconclusive),
            ledger_synced_up = synced,
            "resubmission tick"
        );
        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for Resubmitter {
    fn name(&self) -> &'static str {
        "resubmitter"
    }

    async fn tick(&self) -> Result<(), GatewayError> {
        self.run_tick().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_consensus::{LedgerConfirmationConfig, NodeTrust};
    use gateway_nullables::{NullClock, NullStore, NullSubmitter};
    use gateway_types::{MempoolStatus, Timestamp};

    fn trust(name: &str, request_weight: f64, submission_enabled: bool) -> NodeTrust {
        NodeTrust {
            name: NodeName::new(name).unwrap(),
            trust_weight: 1.0,
            request_weight,
            enabled: true,
            indexing_enabled: true,
            submission_enabled,
        }
    }

    fn resubmitter(nodes: Vec<NodeTrust>) -> Resubmitter {
        resubmitter_with(nodes, MempoolConfig::default(), Arc::new(NullSubmitter::new())).0
    }

    fn resubmitter_with(
        nodes: Vec<NodeTrust>,
        config: MempoolConfig,
        submitter: Arc<NullSubmitter>,
    ) -> (Resubmitter, Arc<NullStore>) {
        let registry = Arc::new(TrustRegistry::new(nodes).unwrap());
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::from_secs(100));
        let metrics = Arc::new(GatewayMetrics::new());
        let ledger = Arc::new(
            LedgerConfirmation::new(
                registry.clone(),
                LedgerConfirmationConfig::default(),
                store.clone(),
                clock.clone(),
                metrics.clone(),
            )
            .unwrap(),
        );
        let resubmitter = Resubmitter::new(
            registry,
            config,
            store.clone(),
            submitter,
            ledger,
            clock,
            metrics,
            CancellationToken::new(),
        )
        .with_seed(7);
        (resubmitter, store)
    }

    fn missing(id: u8) -> MempoolTransaction {
        let mut tx = MempoolTransaction::submitted_locally(
            TxHash::new([id; 32]),
            vec![id],
            NodeName::new("a").unwrap(),
            Timestamp::from_secs(0),
        );
        tx.mark_missing(Timestamp::from_secs(1));
        tx
    }

    #[test]
    fn nodes_without_request_weight_or_closed_to_submission_are_never_picked() {
        let r = resubmitter(vec![
            trust("a", 0.0, true),
            trust("b", 1.0, true),
            trust("c", 5.0, false),
        ]);
        let assignments = r.assign_nodes((0..20).map(missing).collect()).unwrap();
        assert_eq!(assignments.len(), 20);
        assert!(assignments.iter().all(|(_, node)| node.as_str() == "b"));
    }

    #[test]
    fn no_submission_node_yields_none() {
        let r = resubmitter(vec![trust("a", 1.0, false)]);
        assert!(r.assign_nodes(vec![missing(1)]).is_none());
        assert_eq!(r.assign_nodes(Vec::new()), Some(Vec::new()));
    }

    #[tokio::test]
    async fn cancelled_gateway_makes_submissions_inconclusive() {
        let r = resubmitter(vec![trust("a", 1.0, true)]);
        r.token.cancel();
        let result = r.submit_one(&NodeName::new("a").unwrap(), b"tx").await;
        assert!(matches!(result, Err(SubmitError::Transport(_))));
    }

    #[tokio::test]
    async fn hanging_node_times_out_without_holding_up_the_batch() {
        let config = MempoolConfig {
            submission_request_timeout_ms: 300,
            ..MempoolConfig::default()
        };
        let submitter = Arc::new(NullSubmitter::new());
        for id in [2, 4, 6, 8] {
            submitter.never_answer(vec![id]);
        }
        let (r, store) = resubmitter_with(vec![trust("a", 1.0, true)], config, submitter.clone());
        for id in 1..=8 {
            store.put_mempool_transaction(missing(id));
        }

        let started = std::time::Instant::now();
        let report = r.run_tick().await.unwrap();
        // Four sequential timeouts would take 1.2 s.
        assert!(started.elapsed() < Duration::from_millis(1_000));

        assert_eq!(submitter.calls().len(), 8);
        assert_eq!(report.count(Resolution::Inconclusive), 4);
        assert_eq!(report.count(Resolution::Accepted), 4);
        for (id, resolution) in &report.outcomes {
            let expected = if id.as_bytes()[0] % 2 == 0 {
                Resolution::Inconclusive
            } else {
                Resolution::Accepted
            };
            assert_eq!(*resolution, expected, "{}", id);
        }

        for row in store.mempool_rows() {
            assert_eq!(row.submission_count, 2);
            let expected = if row.id.as_bytes()[0] % 2 == 0 {
                MempoolStatus::Missing
            } else {
                MempoolStatus::InNodeMempool
            };
            assert_eq!(row.status, expected);
        }
    }
}
