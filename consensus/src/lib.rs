//! Consensus: trust-weighted agreement over what upstream nodes report.
//!
//! Each configured node reports its ledger tip and the committed
//! transactions it holds. A state version is confirmed once the nodes
//! agreeing on its accumulator carry enough trust; confirmed records are then
//! checked to chain from the committed tip before anything is written.
//!
//! ## Module overview
//!
//! - [`trust`]: Static per-node trust and submission weights.
//! - [`report_buffer`]: Per-node tips and buffered transaction reports.
//! - [`quorum`]: Trust-weighted resolution of one state version.
//! - [`extension`]: Walks forward from the committed tip while quorum holds.
//! - [`consistency`]: Summary derivation and hash-chain checks.
//! - [`config`]: Ledger confirmation settings.
//! - [`error`]: Consensus error types.

pub mod config;
pub mod consistency;
pub mod error;
pub mod extension;
pub mod quorum;
pub mod report_buffer;
pub mod trust;

pub use config::LedgerConfirmationConfig;
pub use consistency::{build_consistent_extension, check_child, derive_summary};
pub use error::ConsensusError;
pub use extension::{
    is_sufficiently_synced, ExtensionBuilder, ExtensionProposal, QuorumStatus, TrustRequirements,
};
pub use quorum::{resolve, QuorumResolution, TransactionClaim};
pub use report_buffer::NodeReportBuffer;
pub use trust::{NodeTrust, TrustRegistry};
