//! Mempool tracker: merges node mempool snapshots and moves stored
//! transactions through their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use gateway_crypto::hash_transaction;
use gateway_mempool::{
    count_reappeared, plan_missing, MempoolAggregator, MempoolConfig, NodeMempoolSnapshot,
};
use gateway_store::{MempoolStore, MergePolicy};
use gateway_types::{Clock, MempoolStatus, MempoolTransaction, NodeName, TxHash};
use gateway_utils::{limited_info, LogLimiter};

use crate::metrics::GatewayMetrics;
use crate::tracing_spans::{mempool_tick_span, node_report_span};
use crate::worker::PeriodicTask;
use crate::GatewayError;

const SIZE_LOG_WINDOW: Duration = Duration::from_secs(60);

/// What one tracker tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MempoolTickReport {
    pub combined_size: usize,
    pub fresh_nodes: usize,
    pub created: usize,
    pub reappeared: usize,
    pub marked_missing: usize,
    pub failed_timeout: usize,
}

pub struct MempoolTracker {
    aggregator: MempoolAggregator,
    config: MempoolConfig,
    store: Arc<dyn MempoolStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
    size_log: LogLimiter,
}

impl MempoolTracker {
    pub fn new(
        nodes: impl IntoIterator<Item = NodeName>,
        config: MempoolConfig,
        store: Arc<dyn MempoolStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            aggregator: MempoolAggregator::new(nodes),
            config,
            store,
            clock,
            metrics,
            size_log: LogLimiter::new(SIZE_LOG_WINDOW),
        }
    }

    /// Replace a node's mempool snapshot.
    pub fn report_snapshot(&self, snapshot: NodeMempoolSnapshot) -> Result<(), GatewayError> {
        let _span = node_report_span(snapshot.node.as_str(), "mempool").entered();
        debug!(transactions = snapshot.transactions.len(), "mempool snapshot");
        Ok(self.aggregator.report_snapshot(snapshot)?)
    }

    /// Remember a transaction this gateway just handed to `node`.
    pub fn record_local_submission(
        &self,
        payload: Vec<u8>,
        node: NodeName,
    ) -> Result<TxHash, GatewayError> {
        let id = hash_transaction(&payload);
        let tx = MempoolTransaction::submitted_locally(id, payload, node, self.clock.now());
        self.store
            .upsert_mempool_transactions(&[tx], MergePolicy::LocalSubmission)?;
        debug!(transaction = %id, "recorded local submission");
        Ok(id)
    }

    /// Merge the fresh snapshots and reclassify stored transactions.
    ///
    /// Fails with a precondition error when no snapshot is fresh; nothing is
    /// marked missing on stale data.
    pub fn run_tick(&self) -> Result<MempoolTickReport, GatewayError> {
        let _span = mempool_tick_span().entered();
        let now = self.clock.now();
        let combined = self.aggregator.combine(now, self.config.staleness_window())?;
        let present = combined.ids();

        let awaiting = self
            .store
            .mempool_transactions_with_status(&[MempoolStatus::Missing, MempoolStatus::ResolvedButUnknown])?;
        let reappeared = count_reappeared(&awaiting, &present);

        let observed = self
            .store
            .upsert_mempool_transactions(&combined.observed_rows(now), MergePolicy::ObservedInMempool)?;

        // Observation and reclassification are separate writes. If the second
        // fails, the observations stand and the next tick replans from them.
        let in_mempool = self
            .store
            .mempool_transactions_with_status(&[MempoolStatus::InNodeMempool])?;
        let plan = plan_missing(&in_mempool, &present, now, &self.config);
        if !plan.updates.is_empty() {
            self.store
                .upsert_mempool_transactions(&plan.updates, MergePolicy::LifecycleTransition)?;
        }

        let report = MempoolTickReport {
            combined_size: combined.len(),
            fresh_nodes: combined.fresh_nodes.len(),
            created: observed.inserted,
            reappeared,
            marked_missing: plan.marked_missing,
            failed_timeout: plan.failed_timeout,
        };

        self.metrics.combined_mempool_size.set(report.combined_size as i64);
        self.metrics.mempool_created.inc_by(report.created as u64);
        self.metrics.mempool_reappeared.inc_by(report.reappeared as u64);
        self.metrics
            .mempool_marked_missing
            .inc_by(report.marked_missing as u64);
        self.metrics
            .mempool_failed_timeout
            .inc_by(report.failed_timeout as u64);

        limited_info!(
            self.size_log,
            now,
            size = report.combined_size,
            fresh_nodes = report.fresh_nodes,
            stale_nodes = combined.stale_nodes.len(),
            created = report.created,
            missing = report.marked_missing,
            "combined mempool"
        );
        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for MempoolTracker {
    fn name(&self) -> &'static str {
        "mempool_tracker"
    }

    async fn tick(&self) -> Result<(), GatewayError> {
        self.run_tick().map(|_| ())
    }
}
