use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsensusError {
    #[error("node {0} is not configured")]
    UnknownNode(String),

    #[error("node {0} reported transactions before reporting its ledger tip")]
    TipNotReported(String),

    #[error("node {0} is configured more than once")]
    DuplicateNode(String),

    #[error("node {node} has invalid trust weight {weight}")]
    InvalidTrustWeight { node: String, weight: f64 },

    #[error("expected state version {expected}, got {found}")]
    NonContiguousStateVersion { expected: u64, found: u64 },

    #[error("transaction at state version {state_version} declares hash {declared} but its payload hashes to {computed}")]
    TransactionHashMismatch {
        state_version: u64,
        declared: String,
        computed: String,
    },

    #[error("accumulator at state version {state_version} is {declared} but chains to {computed}")]
    AccumulatorMismatch {
        state_version: u64,
        declared: String,
        computed: String,
    },
}

impl ConsensusError {
    /// A node lied or there is a bug: the confirmed data does not chain.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NonContiguousStateVersion { .. }
                | Self::TransactionHashMismatch { .. }
                | Self::AccumulatorMismatch { .. }
        )
    }
}
