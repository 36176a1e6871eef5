//! Ledger gateway services: the runtime around the synchronization core.
//!
//! The gateway:
//! - Confirms committed transactions reported by several untrusted nodes
//!   by trust-weighted quorum and commits them to its own ledger
//! - Tracks pending transactions across node mempools
//! - Resubmits its own transactions that drop out of every mempool
//! - Prunes mempool bookkeeping past retention
//! - Exposes Prometheus metrics and sync status over HTTP

pub mod accumulator_cache;
pub mod config;
pub mod core_api;
pub mod error;
pub mod gateway;
pub mod ledger_confirmation;
pub mod logging;
pub mod mempool_pruner;
pub mod mempool_tracker;
pub mod metrics;
pub mod resubmitter;
pub mod shutdown;
pub mod status_server;
pub mod tracing_spans;
pub mod worker;

pub use accumulator_cache::{RecentAccumulators, TipConsistency};
pub use config::{GatewayConfig, NodeConfig};
pub use core_api::CoreApiSubmitter;
pub use error::{ErrorSeverity, GatewayError};
pub use gateway::Gateway;
pub use ledger_confirmation::{CycleReport, LedgerConfirmation};
pub use logging::{init_logging, LogFormat};
pub use mempool_pruner::MempoolPruner;
pub use mempool_tracker::{MempoolTickReport, MempoolTracker};
pub use metrics::GatewayMetrics;
pub use resubmitter::{ResubmissionReport, Resubmitter};
pub use shutdown::ShutdownController;
pub use status_server::SyncStatus;
pub use worker::{spawn_looped, PeriodicTask};
