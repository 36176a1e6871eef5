//! Gateway configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use gateway_consensus::{LedgerConfirmationConfig, NodeTrust, TrustRegistry};
use gateway_mempool::MempoolConfig;
use gateway_types::{NetworkId, NodeName};

use crate::GatewayError;

/// One upstream full node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Base URL of the node's Core API, e.g. `http://node-a:3333/core`.
    pub core_api_url: String,
    /// How much this node's ledger reports count towards quorum.
    #[serde(default = "default_weighting")]
    pub trust_weighting: f64,
    /// Relative share of transaction submissions sent to this node.
    #[serde(default = "default_weighting")]
    pub request_weighting: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub disabled_for_transaction_indexing: bool,
    #[serde(default)]
    pub disabled_for_submission: bool,
}

impl NodeConfig {
    pub fn trust(&self) -> Result<NodeTrust, GatewayError> {
        Ok(NodeTrust {
            name: NodeName::new(&self.name).map_err(|e| GatewayError::Config(e.to_string()))?,
            trust_weight: self.trust_weighting,
            request_weight: self.request_weighting,
            enabled: self.enabled,
            indexing_enabled: !self.disabled_for_transaction_indexing,
            submission_enabled: !self.disabled_for_submission,
        })
    }
}

/// Configuration for a gateway instance.
///
/// Can be loaded from a TOML file via [`GatewayConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Which network the upstream nodes run.
    #[serde(default)]
    pub network: NetworkId,

    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to serve `/metrics` and `/status`.
    #[serde(default)]
    pub enable_status_server: bool,

    #[serde(default = "default_status_port")]
    pub status_port: u16,

    #[serde(default = "default_ledger_confirmation_interval_ms")]
    pub ledger_confirmation_interval_ms: u64,

    #[serde(default = "default_mempool_tracker_interval_ms")]
    pub mempool_tracker_interval_ms: u64,

    #[serde(default = "default_resubmission_interval_ms")]
    pub resubmission_interval_ms: u64,

    #[serde(default = "default_mempool_prune_interval_ms")]
    pub mempool_prune_interval_ms: u64,

    /// Upstream nodes, in quorum tie-break order.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub ledger_confirmation: LedgerConfirmationConfig,

    #[serde(default)]
    pub mempool: MempoolConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_weighting() -> f64 {
    1.0
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./gateway_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_status_port() -> u16 {
    9090
}

fn default_ledger_confirmation_interval_ms() -> u64 {
    200
}

fn default_mempool_tracker_interval_ms() -> u64 {
    1_000
}

fn default_resubmission_interval_ms() -> u64 {
    1_000
}

fn default_mempool_prune_interval_ms() -> u64 {
    10_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GatewayError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GatewayError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, GatewayError> {
        toml::from_str(s).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, GatewayError> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))
    }

    pub fn ledger_confirmation_interval(&self) -> Duration {
        Duration::from_millis(self.ledger_confirmation_interval_ms)
    }

    pub fn mempool_tracker_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_tracker_interval_ms)
    }

    pub fn resubmission_interval(&self) -> Duration {
        Duration::from_millis(self.resubmission_interval_ms)
    }

    pub fn mempool_prune_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_prune_interval_ms)
    }

    /// The trust registry described by `nodes`.
    pub fn trust_registry(&self) -> Result<TrustRegistry, GatewayError> {
        let nodes = self
            .nodes
            .iter()
            .map(NodeConfig::trust)
            .collect::<Result<Vec<_>, _>>()?;
        TrustRegistry::new(nodes).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.ledger_confirmation
            .validate()
            .and_then(|()| self.mempool.validate())
            .map_err(GatewayError::Config)?;

        for (name, interval) in [
            ("ledger_confirmation_interval_ms", self.ledger_confirmation_interval_ms),
            ("mempool_tracker_interval_ms", self.mempool_tracker_interval_ms),
            ("resubmission_interval_ms", self.resubmission_interval_ms),
            ("mempool_prune_interval_ms", self.mempool_prune_interval_ms),
        ] {
            if interval == 0 {
                return Err(GatewayError::Config(format!("{} must be positive", name)));
            }
        }

        for node in &self.nodes {
            if !(node.trust_weighting > 0.0) || !node.trust_weighting.is_finite() {
                return Err(GatewayError::Config(format!(
                    "node {} must have a positive trust_weighting",
                    node.name
                )));
            }
            if node.request_weighting < 0.0 || !node.request_weighting.is_finite() {
                return Err(GatewayError::Config(format!(
                    "node {} has a negative request_weighting",
                    node.name
                )));
            }
        }
        self.trust_registry().map(|_| ())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::default(),
            data_dir: default_data_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_status_server: false,
            status_port: default_status_port(),
            ledger_confirmation_interval_ms: default_ledger_confirmation_interval_ms(),
            mempool_tracker_interval_ms: default_mempool_tracker_interval_ms(),
            resubmission_interval_ms: default_resubmission_interval_ms(),
            mempool_prune_interval_ms: default_mempool_prune_interval_ms(),
            nodes: Vec::new(),
            ledger_confirmation: LedgerConfirmationConfig::default(),
            mempool: MempoolConfig::default(),
        }
    }
}
