//! Mempool tracking, resubmission and pruning settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const WEEK_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Node snapshots older than this are left out of the combined mempool.
    pub node_mempool_staleness_window_ms: u64,
    /// A fresh submission is not declared missing within this period.
    pub post_submission_grace_period_ms: u64,
    pub min_delay_between_missing_and_resubmission_ms: u64,
    pub min_delay_between_resubmissions_ms: u64,
    /// Resubmission stops and the transaction fails after this long since
    /// its last submission to the gateway.
    pub stop_resubmitting_after_secs: u64,
    pub resubmission_batch_size: usize,
    pub submission_request_timeout_ms: u64,
    /// Margin for comparing ledger round timestamps with local time.
    pub max_clock_drift_ms: u64,
    /// The ledger counts as synced up when its round timestamp is this close to now.
    pub synced_up_window_secs: u64,

    pub prune_committed_after_secs: u64,
    pub prune_missing_after_last_gateway_submission_secs: u64,
    pub prune_missing_after_first_seen_secs: u64,
    pub prune_requires_missing_for_secs: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            node_mempool_staleness_window_ms: 10_000,
            post_submission_grace_period_ms: 5_000,
            min_delay_between_missing_and_resubmission_ms: 10_000,
            min_delay_between_resubmissions_ms: 10_000,
            stop_resubmitting_after_secs: 300,
            resubmission_batch_size: 30,
            submission_request_timeout_ms: 4_000,
            max_clock_drift_ms: 1_000,
            synced_up_window_secs: 60,
            prune_committed_after_secs: 20,
            prune_missing_after_last_gateway_submission_secs: WEEK_SECS,
            prune_missing_after_first_seen_secs: WEEK_SECS,
            prune_requires_missing_for_secs: 60,
        }
    }
}

impl MempoolConfig {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_millis(self.node_mempool_staleness_window_ms)
    }

    pub fn post_submission_grace_period(&self) -> Duration {
        Duration::from_millis(self.post_submission_grace_period_ms)
    }

    pub fn min_delay_between_missing_and_resubmission(&self) -> Duration {
        Duration::from_millis(self.min_delay_between_missing_and_resubmission_ms)
    }

    pub fn min_delay_between_resubmissions(&self) -> Duration {
        Duration::from_millis(self.min_delay_between_resubmissions_ms)
    }

    pub fn stop_resubmitting_after(&self) -> Duration {
        Duration::from_secs(self.stop_resubmitting_after_secs)
    }

    pub fn submission_request_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_request_timeout_ms)
    }

    pub fn max_clock_drift(&self) -> Duration {
        Duration::from_millis(self.max_clock_drift_ms)
    }

    pub fn synced_up_window(&self) -> Duration {
        Duration::from_secs(self.synced_up_window_secs)
    }

    pub fn prune_committed_after(&self) -> Duration {
        Duration::from_secs(self.prune_committed_after_secs)
    }

    pub fn prune_missing_after_last_gateway_submission(&self) -> Duration {
        Duration::from_secs(self.prune_missing_after_last_gateway_submission_secs)
    }

    pub fn prune_missing_after_first_seen(&self) -> Duration {
        Duration::from_secs(self.prune_missing_after_first_seen_secs)
    }

    pub fn prune_requires_missing_for(&self) -> Duration {
        Duration::from_secs(self.prune_requires_missing_for_secs)
    }

    /// Describe the first invalid value, if any.
    pub fn validate(&self) -> Result<(), String> {
        let non_zero = [
            ("node_mempool_staleness_window_ms", self.node_mempool_staleness_window_ms),
            ("stop_resubmitting_after_secs", self.stop_resubmitting_after_secs),
            ("submission_request_timeout_ms", self.submission_request_timeout_ms),
            ("synced_up_window_secs", self.synced_up_window_secs),
            ("resubmission_batch_size", self.resubmission_batch_size as u64),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(format!("{} must be positive", name));
            }
        }
        Ok(())
    }
}
