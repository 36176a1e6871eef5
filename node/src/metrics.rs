//! Prometheus metrics for the gateway.
//!
//! Covers ledger quorum health, commit throughput, per-node consistency, the
//! mempool lifecycle and resubmission outcomes. The [`GatewayMetrics`] struct
//! owns a dedicated [`Registry`] that the status server's `/metrics` endpoint
//! encodes into the Prometheus text exposition format.

use prometheus::{
    register_gauge_vec_with_registry, register_gauge_with_registry,
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts,
    IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::GatewayError;

/// Consistency gauge value when a node's tip accumulator is not in the cache.
pub const CONSISTENCY_UNKNOWN: f64 = 0.5;

/// Central collection of all gateway Prometheus metrics.
pub struct GatewayMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Ledger confirmation ─────────────────────────────────────────────
    /// 1 when the last cycle extended the ledger, 0 when quorum is
    /// unreachable, 0.5 when it is still unknown.
    pub quorum_exists: Gauge,
    /// 1 when the last proposed extension chained cleanly, 0 when it did not.
    pub quorum_extension_consistent: Gauge,
    pub sufficiently_synced_nodes: IntGauge,
    pub sufficiently_synced_trust: Gauge,
    pub trust_required_now: Gauge,
    pub trust_required_if_all_synced: Gauge,
    pub committed_transactions: IntCounter,
    pub batch_commit_time_ms: Histogram,
    pub db_tip_state_version: IntGauge,
    pub db_tip_round_timestamp_ms: IntGauge,
    /// Last reported tip state version, labelled by `node`.
    pub node_tip_state_version: IntGaugeVec,
    /// 1 consistent, 0 inconsistent, 0.5 unknown; labelled by `node`.
    pub node_consistent: GaugeVec,

    // ── Mempool ─────────────────────────────────────────────────────────
    pub combined_mempool_size: IntGauge,
    pub mempool_created: IntCounter,
    pub mempool_reappeared: IntCounter,
    pub mempool_marked_missing: IntCounter,
    pub mempool_failed_timeout: IntCounter,
    pub resubmission_queue_size: IntGauge,
    pub resubmission_attempts: IntCounter,
    /// Resubmission outcomes, labelled by `result`.
    pub resubmission_resolutions: IntCounterVec,
    pub mempool_pruned: IntCounter,
    /// Stored mempool rows, labelled by `status`.
    pub mempool_size_by_status: IntGaugeVec,

    // ── Workers ─────────────────────────────────────────────────────────
    /// Failed ticks, labelled by `worker` and `severity`.
    pub worker_tick_failures: IntCounterVec,
}

impl GatewayMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let quorum_exists = register_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_quorum_exists_status",
                "1 if a quorum extended the ledger, 0 if unreachable, 0.5 if unknown"
            ),
            registry
        )
        .expect("failed to register quorum_exists gauge");

        let quorum_extension_consistent = register_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_quorum_extension_consistent_status",
                "1 if the quorum-confirmed extension chained to the committed tip"
            ),
            registry
        )
        .expect("failed to register quorum_extension_consistent gauge");

        let sufficiently_synced_nodes = register_int_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_sufficiently_synced_nodes",
                "Voting nodes within the synced threshold of the committed tip"
            ),
            registry
        )
        .expect("failed to register sufficiently_synced_nodes gauge");

        let sufficiently_synced_trust = register_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_sufficiently_synced_trust",
                "Trust held by sufficiently synced nodes"
            ),
            registry
        )
        .expect("failed to register sufficiently_synced_trust gauge");

        let trust_required_now = register_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_trust_required_for_quorum",
                "Trust a claim needs to be confirmed this cycle"
            ),
            registry
        )
        .expect("failed to register trust_required_now gauge");

        let trust_required_if_all_synced = register_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_sync_trust_required_if_all_synced",
                "Trust a claim would need if every node were synced"
            ),
            registry
        )
        .expect("failed to register trust_required_if_all_synced gauge");

        let committed_transactions = register_int_counter_with_registry!(
            Opts::new(
                "gateway_ledger_committed_transactions_total",
                "Total transactions committed to the ledger"
            ),
            registry
        )
        .expect("failed to register committed_transactions counter");

        // Exponential buckets covering 1 ms → ~16 s.
        let batch_commit_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "gateway_ledger_batch_commit_time_ms",
                "Time spent committing one extension, in milliseconds"
            )
            .buckets(
                prometheus::exponential_buckets(1.0, 2.0, 15)
                    .expect("static histogram buckets are valid")
            ),
            registry
        )
        .expect("failed to register batch_commit_time_ms histogram");

        let db_tip_state_version = register_int_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_tip_state_version",
                "State version of the committed tip"
            ),
            registry
        )
        .expect("failed to register db_tip_state_version gauge");

        let db_tip_round_timestamp_ms = register_int_gauge_with_registry!(
            Opts::new(
                "gateway_ledger_tip_round_timestamp_ms",
                "Round timestamp of the committed tip in unix milliseconds"
            ),
            registry
        )
        .expect("failed to register db_tip_round_timestamp_ms gauge");

        let node_tip_state_version = register_int_gauge_vec_with_registry!(
            Opts::new(
                "gateway_node_ledger_tip_state_version",
                "Latest tip state version reported by each node"
            ),
            &["node"],
            registry
        )
        .expect("failed to register node_tip_state_version gauge");

        let node_consistent = register_gauge_vec_with_registry!(
            Opts::new(
                "gateway_node_ledger_tip_is_consistent_with_quorum",
                "1 consistent, 0 inconsistent, 0.5 unknown"
            ),
            &["node"],
            registry
        )
        .expect("failed to register node_consistent gauge");

        let combined_mempool_size = register_int_gauge_with_registry!(
            Opts::new(
                "gateway_mempool_combined_size",
                "Transactions in the merged fresh node mempools"
            ),
            registry
        )
        .expect("failed to register combined_mempool_size gauge");

        let mempool_created = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_transactions_created_total",
                "Mempool transactions first seen by the gateway"
            ),
            registry
        )
        .expect("failed to register mempool_created counter");

        let mempool_reappeared = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_transactions_reappeared_total",
                "Missing transactions seen again in a node mempool"
            ),
            registry
        )
        .expect("failed to register mempool_reappeared counter");

        let mempool_marked_missing = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_transactions_marked_missing_total",
                "Transactions that dropped out of every fresh node mempool"
            ),
            registry
        )
        .expect("failed to register mempool_marked_missing counter");

        let mempool_failed_timeout = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_transactions_failed_timeout_total",
                "Self-submitted transactions whose resubmission window ran out"
            ),
            registry
        )
        .expect("failed to register mempool_failed_timeout counter");

        let resubmission_queue_size = register_int_gauge_with_registry!(
            Opts::new(
                "gateway_mempool_resubmission_queue_size",
                "Transactions currently due for resubmission"
            ),
            registry
        )
        .expect("failed to register resubmission_queue_size gauge");

        let resubmission_attempts = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_resubmission_attempts_total",
                "Resubmission requests sent to nodes"
            ),
            registry
        )
        .expect("failed to register resubmission_attempts counter");

        let resubmission_resolutions = register_int_counter_vec_with_registry!(
            Opts::new(
                "gateway_mempool_resubmission_resolutions_total",
                "Resubmission outcomes by result"
            ),
            &["result"],
            registry
        )
        .expect("failed to register resubmission_resolutions counter");

        let mempool_pruned = register_int_counter_with_registry!(
            Opts::new(
                "gateway_mempool_transactions_pruned_total",
                "Mempool rows deleted by the pruner"
            ),
            registry
        )
        .expect("failed to register mempool_pruned counter");

        let mempool_size_by_status = register_int_gauge_vec_with_registry!(
            Opts::new(
                "gateway_mempool_size_by_status",
                "Stored mempool rows by lifecycle status"
            ),
            &["status"],
            registry
        )
        .expect("failed to register mempool_size_by_status gauge");

        let worker_tick_failures = register_int_counter_vec_with_registry!(
            Opts::new(
                "gateway_worker_tick_failures_total",
                "Periodic worker ticks that returned an error"
            ),
            &["worker", "severity"],
            registry
        )
        .expect("failed to register worker_tick_failures counter");

        quorum_exists.set(CONSISTENCY_UNKNOWN);
        quorum_extension_consistent.set(1.0);

        Self {
            registry,
            quorum_exists,
            quorum_extension_consistent,
            sufficiently_synced_nodes,
            sufficiently_synced_trust,
            trust_required_now,
            trust_required_if_all_synced,
            committed_transactions,
            batch_commit_time_ms,
            db_tip_state_version,
            db_tip_round_timestamp_ms,
            node_tip_state_version,
            node_consistent,
            combined_mempool_size,
            mempool_created,
            mempool_reappeared,
            mempool_marked_missing,
            mempool_failed_timeout,
            resubmission_queue_size,
            resubmission_attempts,
            resubmission_resolutions,
            mempool_pruned,
            mempool_size_by_status,
            worker_tick_failures,
        }
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, GatewayError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| GatewayError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| GatewayError::Metrics(e.to_string()))
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_families() {
        let metrics = GatewayMetrics::new();
        metrics.committed_transactions.inc_by(3);
        metrics.node_consistent.with_label_values(&["node-a"]).set(1.0);

        let text = metrics.encode().unwrap();
        assert!(text.contains("gateway_ledger_committed_transactions_total 3"));
        assert!(text.contains("gateway_ledger_sync_quorum_exists_status 0.5"));
        assert!(text.contains("node=\"node-a\""));
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let a = GatewayMetrics::new();
        let b = GatewayMetrics::new();
        a.mempool_created.inc();
        assert_eq!(b.mempool_created.get(), 0);
    }
}
