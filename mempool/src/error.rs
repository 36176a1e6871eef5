use gateway_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("node {0} is not configured")]
    UnknownNode(String),

    #[error("no fresh mempool snapshot from any of {configured} nodes")]
    NoFreshSnapshots { configured: usize },

    #[error("no node accepts transaction submissions")]
    NoSubmissionNode,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MempoolError {
    /// Whether the failure only affects the current tick.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoFreshSnapshots { .. } | Self::NoSubmissionNode)
    }
}
