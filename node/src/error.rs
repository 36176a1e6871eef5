use gateway_consensus::ConsensusError;
use gateway_mempool::MempoolError;
use gateway_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("status server error: {0}")]
    StatusServer(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}

/// How loudly a failed tick is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Expected while syncing or during blips; the next tick retries.
    Transient,
    /// A node lied or there is a bug. Pages an operator.
    Structural,
    /// The tick could not run at all, e.g. no fresh mempool data.
    Precondition,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Structural => "structural",
            Self::Precondition => "precondition",
        }
    }
}

impl GatewayError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Consensus(e) if e.is_structural() => ErrorSeverity::Structural,
            Self::Store(StoreError::CommitPreconditionFailed(_) | StoreError::Corruption(_))
            | Self::Mempool(MempoolError::Store(
                StoreError::CommitPreconditionFailed(_) | StoreError::Corruption(_),
            )) => ErrorSeverity::Structural,
            Self::Mempool(e) if e.is_precondition() => ErrorSeverity::Precondition,
            Self::Config(_) => ErrorSeverity::Precondition,
            _ => ErrorSeverity::Transient,
        }
    }
}
