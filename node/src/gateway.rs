//! The gateway facade: wires the services to one store, one clock and one
//! submitter, and runs them as periodic workers.
//!
//! Node workers talk to the gateway through the `report_*` methods and
//! [`Gateway::requested_range`]. Every periodic task can also be driven by
//! hand through the `run_*` methods, which is how tests exercise it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gateway_consensus::TrustRegistry;
use gateway_mempool::{NodeMempoolSnapshot, TransactionSubmitter};
use gateway_store::{LedgerStore, MempoolStore};
use gateway_types::{
    Clock, CommittedTransactionRecord, NodeLedgerTip, NodeName, TransactionSummary, TxHash,
};
use gateway_utils::format_duration;

use crate::config::GatewayConfig;
use crate::ledger_confirmation::{CycleReport, LedgerConfirmation};
use crate::mempool_pruner::MempoolPruner;
use crate::mempool_tracker::{MempoolTickReport, MempoolTracker};
use crate::metrics::GatewayMetrics;
use crate::resubmitter::{ResubmissionReport, Resubmitter};
use crate::shutdown::ShutdownController;
use crate::status_server::{self, StatusState};
use crate::worker::{spawn_looped, PeriodicTask};
use crate::GatewayError;

/// Maximum time to wait for workers to finish during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<TrustRegistry>,
    ledger: Arc<LedgerConfirmation>,
    tracker: Arc<MempoolTracker>,
    resubmitter: Arc<Resubmitter>,
    pruner: Arc<MempoolPruner>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl Gateway {
    pub fn new<S>(
        config: GatewayConfig,
        store: Arc<S>,
        submitter: Arc<dyn TransactionSubmitter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError>
    where
        S: LedgerStore + MempoolStore + 'static,
    {
        config.validate()?;
        let registry = Arc::new(config.trust_registry()?);
        let metrics = Arc::new(GatewayMetrics::new());
        let shutdown = ShutdownController::new();

        let ledger_store: Arc<dyn LedgerStore> = store.clone();
        let mempool_store: Arc<dyn MempoolStore> = store;

        let ledger = Arc::new(LedgerConfirmation::new(
            registry.clone(),
            config.ledger_confirmation.clone(),
            ledger_store,
            clock.clone(),
            metrics.clone(),
        )?);
        let tracker = Arc::new(MempoolTracker::new(
            registry.nodes().iter().map(|n| n.name.clone()),
            config.mempool.clone(),
            mempool_store.clone(),
            clock.clone(),
            metrics.clone(),
        ));
        let resubmitter = Arc::new(Resubmitter::new(
            registry.clone(),
            config.mempool.clone(),
            mempool_store.clone(),
            submitter,
            ledger.clone(),
            clock.clone(),
            metrics.clone(),
            shutdown.token(),
        ));
        let pruner = Arc::new(MempoolPruner::new(
            config.mempool.clone(),
            mempool_store,
            ledger.clone(),
            clock.clone(),
            metrics.clone(),
        ));

        info!(
            nodes = registry.nodes().len(),
            total_trust = registry.total_voting_trust(),
            committed_tip = ledger.committed_tip().state_version,
            "gateway initialised"
        );

        Ok(Self {
            config,
            registry,
            ledger,
            tracker,
            resubmitter,
            pruner,
            clock,
            metrics,
            shutdown,
            task_handles: Vec::new(),
        })
    }

    /// Spawn the periodic workers and, if enabled, the status server.
    pub fn start(&mut self) {
        let workers: [(Arc<dyn PeriodicTask>, Duration); 4] = [
            (
                self.ledger.clone() as Arc<dyn PeriodicTask>,
                self.config.ledger_confirmation_interval(),
            ),
            (
                self.tracker.clone() as Arc<dyn PeriodicTask>,
                self.config.mempool_tracker_interval(),
            ),
            (
                self.resubmitter.clone() as Arc<dyn PeriodicTask>,
                self.config.resubmission_interval(),
            ),
            (
                self.pruner.clone() as Arc<dyn PeriodicTask>,
                self.config.mempool_prune_interval(),
            ),
        ];
        for (task, interval) in workers {
            self.task_handles.push(spawn_looped(
                task,
                interval,
                self.shutdown.token(),
                self.clock.clone(),
                self.metrics.clone(),
            ));
        }

        if self.config.enable_status_server {
            let state = StatusState {
                metrics: self.metrics.clone(),
                ledger: self.ledger.clone(),
                clock: self.clock.clone(),
                mempool: self.config.mempool.clone(),
            };
            let port = self.config.status_port;
            let token = self.shutdown.token();
            self.task_handles.push(tokio::spawn(async move {
                if let Err(e) = status_server::serve(port, state, token).await {
                    error!(error = %e, port, "status server stopped");
                }
            }));
        }

        info!(workers = self.task_handles.len(), "gateway started");
    }

    /// Cancel every worker and wait for them to finish.
    pub async fn stop(&mut self) -> Result<(), GatewayError> {
        info!("gateway stopping");
        self.shutdown.shutdown();

        let handles: Vec<_> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            warn!(
                "shutdown timeout ({}), some workers may still be running",
                format_duration(SHUTDOWN_TIMEOUT)
            );
            return Err(GatewayError::ShutdownTimeout);
        }

        info!("gateway stopped");
        Ok(())
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn is_running(&self) -> bool {
        !self.task_handles.is_empty() && !self.shutdown.is_shutdown()
    }

    // ── Node worker inputs ──────────────────────────────────────────────

    pub fn report_ledger_tip(&self, tip: NodeLedgerTip) -> Result<(), GatewayError> {
        self.ledger.report_ledger_tip(tip)
    }

    pub fn report_transactions(
        &self,
        node: &NodeName,
        records: Vec<CommittedTransactionRecord>,
    ) -> Result<usize, GatewayError> {
        self.ledger.report_transactions(node, records)
    }

    pub fn requested_range(&self, node: &NodeName) -> Result<Option<(u64, u64)>, GatewayError> {
        self.ledger.requested_range(node)
    }

    pub fn report_mempool_snapshot(&self, snapshot: NodeMempoolSnapshot) -> Result<(), GatewayError> {
        self.tracker.report_snapshot(snapshot)
    }

    /// Track a transaction a client submitted through this gateway to `node`.
    pub fn record_local_submission(
        &self,
        payload: Vec<u8>,
        node: NodeName,
    ) -> Result<TxHash, GatewayError> {
        self.tracker.record_local_submission(payload, node)
    }

    // ── Periodic tasks, one tick at a time ──────────────────────────────

    pub fn run_ledger_cycle(&self) -> Result<CycleReport, GatewayError> {
        self.ledger.run_cycle()
    }

    pub fn run_mempool_tick(&self) -> Result<MempoolTickReport, GatewayError> {
        self.tracker.run_tick()
    }

    pub async fn run_resubmission_tick(&self) -> Result<ResubmissionReport, GatewayError> {
        self.resubmitter.run_tick().await
    }

    pub fn run_prune_tick(&self) -> Result<usize, GatewayError> {
        self.pruner.run_tick()
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn committed_tip(&self) -> TransactionSummary {
        self.ledger.committed_tip()
    }

    pub fn registry(&self) -> &TrustRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
