//! Transaction submission seam.
//!
//! The resubmission scheduler talks to nodes only through
//! [`TransactionSubmitter`], so the HTTP client can be swapped for a scripted
//! one in tests.

use async_trait::async_trait;
use gateway_types::NodeName;
use thiserror::Error;

/// A node took the transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitAccepted {
    /// The node already had it.
    pub duplicate: bool,
}

/// A definitive refusal from the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// An input substate was already consumed by some committed transaction,
    /// possibly this one.
    SubstateConflict(String),
    /// Any other permanent rejection.
    Permanent(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("rejected: {0:?}")]
    Rejected(Rejection),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("submission timed out")]
    Timeout,
}

impl SubmitError {
    /// The node may or may not have received the transaction.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, node: &NodeName, payload: &[u8]) -> Result<SubmitAccepted, SubmitError>;
}
