//! Ledger confirmation tuning.

use serde::{Deserialize, Serialize};

/// Quorum and batching parameters for the ledger confirmation loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfirmationConfig {
    /// Share of eligible trust a claim needs to be confirmed, in (0, 1].
    pub quorum_requires_trust_proportion: f64,
    /// Count only nodes within `sufficiently_synced_state_version_threshold`
    /// of the committed tip towards the quorum denominator.
    pub only_use_sufficiently_synced_up_nodes_for_quorum_calculation: bool,
    pub sufficiently_synced_state_version_threshold: u64,
    /// Most transactions committed per cycle.
    pub max_commit_batch_size: u64,
    /// How far past the committed tip each node is asked to fetch.
    pub max_transaction_pipeline_size_per_node: u64,
    /// Payload bytes a node may have buffered before fetching pauses.
    pub max_estimated_transaction_pipeline_byte_size_per_node: usize,
    /// Recently committed accumulators kept to judge lagging nodes.
    pub accumulator_cache_size: usize,
}

impl Default for LedgerConfirmationConfig {
    fn default() -> Self {
        Self {
            quorum_requires_trust_proportion: 0.51,
            only_use_sufficiently_synced_up_nodes_for_quorum_calculation: true,
            sufficiently_synced_state_version_threshold: 1000,
            max_commit_batch_size: 1000,
            max_transaction_pipeline_size_per_node: 3000,
            max_estimated_transaction_pipeline_byte_size_per_node: 50 * 1024 * 1024,
            accumulator_cache_size: 2000,
        }
    }
}

impl LedgerConfirmationConfig {
    /// Describe the first invalid value, if any.
    pub fn validate(&self) -> Result<(), String> {
        let p = self.quorum_requires_trust_proportion;
        if !(p > 0.0 && p <= 1.0) {
            return Err(format!(
                "quorum_requires_trust_proportion must be in (0, 1], got {}",
                p
            ));
        }
        if self.max_commit_batch_size == 0 {
            return Err("max_commit_batch_size must be positive".to_string());
        }
        if self.max_transaction_pipeline_size_per_node == 0 {
            return Err("max_transaction_pipeline_size_per_node must be positive".to_string());
        }
        if self.max_estimated_transaction_pipeline_byte_size_per_node == 0 {
            return Err(
                "max_estimated_transaction_pipeline_byte_size_per_node must be positive"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LedgerConfirmationConfig::default().validate().is_ok());
    }

    #[test]
    fn proportion_must_be_a_fraction() {
        for p in [0.0, -0.2, 1.01, f64::NAN] {
            let config = LedgerConfirmationConfig {
                quorum_requires_trust_proportion: p,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{} accepted", p);
        }
    }

    #[test]
    fn pipeline_byte_budget_must_be_positive() {
        let config = LedgerConfirmationConfig {
            max_estimated_transaction_pipeline_byte_size_per_node: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
