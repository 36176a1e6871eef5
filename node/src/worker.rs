//! Periodic worker loops.
//!
//! Every background service is one tokio task driving an interval. The tick
//! body is awaited inside the loop, so two ticks of the same worker never
//! overlap; ticks that fall behind are skipped rather than bunched up. A
//! failed tick is logged by severity and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gateway_types::Clock;
use gateway_utils::{limited_info, LogLimiter};

use crate::error::ErrorSeverity;
use crate::metrics::GatewayMetrics;
use crate::GatewayError;

/// Window in which a repeated precondition failure is logged at `info` once.
const PRECONDITION_LOG_WINDOW: Duration = Duration::from_secs(60);

/// One unit of periodic work.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn tick(&self) -> Result<(), GatewayError>;
}

/// Spawn a loop calling `task.tick()` every `interval` until `token` is cancelled.
pub fn spawn_looped(
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    token: CancellationToken,
    clock: Arc<dyn Clock>,
    metrics: Arc<GatewayMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name();
        let precondition_log = LogLimiter::new(PRECONDITION_LOG_WINDOW);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(worker = name, interval_ms = interval.as_millis() as u64, "worker started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(worker = name, "worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = task.tick().await {
                        report_failure(name, &e, &precondition_log, clock.as_ref(), &metrics);
                    }
                }
            }
        }
    })
}

/// Log a failed tick at the level its severity calls for.
pub fn report_failure(
    worker: &str,
    err: &GatewayError,
    precondition_log: &LogLimiter,
    clock: &dyn Clock,
    metrics: &GatewayMetrics,
) {
    let severity = err.severity();
    metrics
        .worker_tick_failures
        .with_label_values(&[worker, severity.as_str()])
        .inc();

    match severity {
        ErrorSeverity::Structural => {
            error!(
                alarm = "structural_inconsistency",
                worker,
                error = %err,
                "tick aborted on inconsistent data"
            );
        }
        ErrorSeverity::Precondition => {
            limited_info!(
                precondition_log,
                clock.now(),
                worker,
                error = %err,
                "tick skipped, precondition not met"
            );
        }
        ErrorSeverity::Transient => {
            warn!(worker, error = %err, "tick failed, retrying next interval");
        }
    }
}
