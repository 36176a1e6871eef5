//! Mempool pruner: deletes rows past their retention and reports the
//! stored mempool size by status.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use gateway_mempool::{prune_criteria, MempoolConfig};
use gateway_store::MempoolStore;
use gateway_types::{Clock, MempoolStatus};

use crate::ledger_confirmation::LedgerConfirmation;
use crate::metrics::GatewayMetrics;
use crate::worker::PeriodicTask;
use crate::GatewayError;

const ALL_STATUSES: [MempoolStatus; 5] = [
    MempoolStatus::InNodeMempool,
    MempoolStatus::Missing,
    MempoolStatus::ResolvedButUnknown,
    MempoolStatus::Committed,
    MempoolStatus::Failed,
];

pub struct MempoolPruner {
    config: MempoolConfig,
    store: Arc<dyn MempoolStore>,
    ledger: Arc<LedgerConfirmation>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
}

impl MempoolPruner {
    pub fn new(
        config: MempoolConfig,
        store: Arc<dyn MempoolStore>,
        ledger: Arc<LedgerConfirmation>,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            clock,
            metrics,
        }
    }

    /// Prune once. Returns how many rows were deleted.
    pub fn run_tick(&self) -> Result<usize, GatewayError> {
        let now = self.clock.now();
        let ledger_round_timestamp = self.ledger.committed_tip().round_timestamp;
        let criteria = prune_criteria(now, ledger_round_timestamp, &self.config);
        if criteria.committed_before.is_none() {
            debug!("ledger behind the committed retention cutoff, keeping committed rows");
        }

        let pruned = self.store.prune_mempool_transactions(&criteria)?;
        self.metrics.mempool_pruned.inc_by(pruned as u64);
        if pruned > 0 {
            info!(pruned, "pruned mempool transactions");
        }

        let counts = self.store.count_mempool_transactions_by_status()?;
        for status in ALL_STATUSES {
            let count = counts
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, n)| *n);
            self.metrics
                .mempool_size_by_status
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
        Ok(pruned)
    }
}

#[async_trait]
impl PeriodicTask for MempoolPruner {
    fn name(&self) -> &'static str {
        "mempool_pruner"
    }

    async fn tick(&self) -> Result<(), GatewayError> {
        self.run_tick().map(|_| ())
    }
}
