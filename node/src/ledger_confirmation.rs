//! Ledger confirmation service: the single writer of the committed tip.
//!
//! Each cycle reads the committed tip, asks the extension builder for
//! whatever quorum confirms on top of it, checks that the confirmed records
//! chain, and commits them atomically. Node workers feed it tips and
//! transactions concurrently; only the confirmation worker runs cycles.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use gateway_consensus::{
    build_consistent_extension, ExtensionBuilder, ExtensionProposal, LedgerConfirmationConfig,
    NodeReportBuffer, QuorumStatus, TrustRegistry,
};
use gateway_store::LedgerStore;
use gateway_types::{Clock, CommittedTransactionRecord, NodeLedgerTip, NodeName, TransactionSummary};
use gateway_utils::format_duration;

use crate::accumulator_cache::{RecentAccumulators, TipConsistency};
use crate::metrics::GatewayMetrics;
use crate::tracing_spans::{ledger_commit_span, node_report_span};
use crate::worker::PeriodicTask;
use crate::GatewayError;

/// What one confirmation cycle did.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub status: QuorumStatus,
    pub transactions_committed: usize,
    pub committed_tip: u64,
    pub mempool_transactions_committed: usize,
}

pub struct LedgerConfirmation {
    registry: Arc<TrustRegistry>,
    buffer: NodeReportBuffer,
    config: LedgerConfirmationConfig,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
    committed: RwLock<TransactionSummary>,
    accumulators: Mutex<RecentAccumulators>,
}

impl LedgerConfirmation {
    pub fn new(
        registry: Arc<TrustRegistry>,
        config: LedgerConfirmationConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
    ) -> Result<Self, GatewayError> {
        let tip = store.read_committed_tip()?;
        let buffer = NodeReportBuffer::with_limits(
            registry.nodes().iter().map(|n| n.name.clone()),
            config.max_transaction_pipeline_size_per_node,
            config.max_estimated_transaction_pipeline_byte_size_per_node,
        );
        buffer.prune_through(tip.state_version);

        let mut accumulators = RecentAccumulators::new(config.accumulator_cache_size);
        if !tip.is_pre_genesis() {
            accumulators.insert(tip.state_version, tip.accumulator_hash);
        }

        let service = Self {
            registry,
            buffer,
            config,
            store,
            clock,
            metrics,
            committed: RwLock::new(tip),
            accumulators: Mutex::new(accumulators),
        };
        service.record_tip_metrics(&service.committed_tip());
        Ok(service)
    }

    /// The last committed summary this service knows about.
    pub fn committed_tip(&self) -> TransactionSummary {
        self.committed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Record a node's latest tip and judge it against recent commits.
    pub fn report_ledger_tip(&self, tip: NodeLedgerTip) -> Result<(), GatewayError> {
        let _span = node_report_span(tip.node.as_str(), "ledger_tip").entered();
        self.buffer.report_ledger_tip(tip.clone())?;

        let node = tip.node.as_str();
        self.metrics
            .node_tip_state_version
            .with_label_values(&[node])
            .set(tip.state_version as i64);

        let committed = self.committed_tip().state_version;
        if tip.state_version > committed {
            return Ok(());
        }
        let consistency = self
            .accumulators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .check(&tip, committed);
        if consistency == TipConsistency::Inconsistent {
            warn!(
                node,
                state_version = tip.state_version,
                accumulator = %tip.accumulator_hash,
                "node tip disagrees with the committed ledger"
            );
        }
        self.metrics
            .node_consistent
            .with_label_values(&[node])
            .set(consistency.gauge_value());
        Ok(())
    }

    /// Buffer committed transactions a node fetched. Returns how many were kept.
    pub fn report_transactions(
        &self,
        node: &NodeName,
        records: Vec<CommittedTransactionRecord>,
    ) -> Result<usize, GatewayError> {
        let _span = node_report_span(node.as_str(), "transactions").entered();
        let received = records.len();
        let buffered = self.buffer.report_transactions(node, records)?;
        debug!(received, buffered, "buffered node transactions");
        Ok(buffered)
    }

    /// What `node` should fetch next, as `(exclusive_lower, inclusive_upper)`.
    pub fn requested_range(&self, node: &NodeName) -> Result<Option<(u64, u64)>, GatewayError> {
        Ok(self
            .buffer
            .requested_range(node, self.committed_tip().state_version)?)
    }

    /// Run one confirmation cycle.
    ///
    /// Chain-check failures leave the ledger untouched and surface as a
    /// structural error. A stale parent at commit time fails the commit
    /// precondition and nothing is written.
    pub fn run_cycle(&self) -> Result<CycleReport, GatewayError> {
        let parent = self.store.read_committed_tip()?;
        let _span = ledger_commit_span(parent.state_version).entered();

        let proposal = ExtensionBuilder::new(&self.registry, &self.buffer, &self.config)
            .propose(parent.state_version);
        self.record_proposal(&proposal);

        let status = proposal.status;
        if proposal.records.is_empty() {
            return Ok(CycleReport {
                status,
                transactions_committed: 0,
                committed_tip: parent.state_version,
                mempool_transactions_committed: 0,
            });
        }

        let now = self.clock.now();
        let extension = match build_consistent_extension(parent.clone(), proposal.records, now) {
            Ok(extension) => {
                self.metrics.quorum_extension_consistent.set(1.0);
                extension
            }
            Err(e) => {
                self.metrics.quorum_extension_consistent.set(0.0);
                return Err(e.into());
            }
        };

        let started = Instant::now();
        let report = self.store.commit_extension(&parent, &extension, now)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let tip = extension.final_summary().clone();
        {
            let mut accumulators = self
                .accumulators
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for tx in &extension.transactions {
                accumulators.insert(tx.summary.state_version, tx.summary.accumulator_hash);
            }
        }
        *self
            .committed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = tip.clone();
        self.buffer.prune_through(tip.state_version);

        self.metrics
            .committed_transactions
            .inc_by(report.transactions_committed as u64);
        self.metrics.batch_commit_time_ms.observe(elapsed_ms);
        self.record_tip_metrics(&tip);

        info!(
            from = parent.state_version + 1,
            to = tip.state_version,
            transactions = report.transactions_committed,
            mempool_committed = report.mempool_transactions_committed,
            ms = elapsed_ms as u64,
            write = %format_duration(report.write_duration),
            "committed ledger extension"
        );

        Ok(CycleReport {
            status,
            transactions_committed: report.transactions_committed,
            committed_tip: report.final_state_version,
            mempool_transactions_committed: report.mempool_transactions_committed,
        })
    }

    fn record_proposal(&self, proposal: &ExtensionProposal) {
        let requirements = &proposal.requirements;
        self.metrics
            .sufficiently_synced_nodes
            .set(requirements.synced_nodes.len() as i64);
        self.metrics
            .sufficiently_synced_trust
            .set(requirements.available_from_synced_nodes);
        self.metrics.trust_required_now.set(requirements.required_now);
        self.metrics
            .trust_required_if_all_synced
            .set(requirements.required_if_all_synced);
        self.metrics
            .quorum_exists
            .set(proposal.status.quorum_exists_gauge());

        for node in &proposal.consistent_nodes {
            self.metrics
                .node_consistent
                .with_label_values(&[node.as_str()])
                .set(1.0);
        }
        for node in &proposal.inconsistent_nodes {
            warn!(node = %node, "node outvoted by quorum");
            self.metrics
                .node_consistent
                .with_label_values(&[node.as_str()])
                .set(0.0);
        }

        if proposal.status.is_alarm() {
            let stalled = proposal.stalled_at.as_ref();
            error!(
                alarm = "quorum_unreachable",
                state_version = stalled.map(|r| r.state_version),
                best_trust = stalled.map(|r| r.best_trust()),
                required = requirements.required_if_all_synced,
                "nodes disagree and no claim can reach quorum"
            );
        }
    }

    fn record_tip_metrics(&self, tip: &TransactionSummary) {
        self.metrics.db_tip_state_version.set(tip.state_version as i64);
        self.metrics
            .db_tip_round_timestamp_ms
            .set(tip.round_timestamp.as_millis() as i64);
    }
}

#[async_trait]
impl PeriodicTask for LedgerConfirmation {
    fn name(&self) -> &'static str {
        "ledger_confirmation"
    }

    async fn tick(&self) -> Result<(), GatewayError> {
        self.run_cycle().map(|_| ())
    }
}
