//! Pre-built [`tracing::Span`] constructors for common gateway operations.
//!
//! Using consistent span names and field sets across the codebase makes it
//! easy to filter, search, and correlate traces.

use tracing::{debug_span, info_span, Span};

/// Span covering one ledger confirmation cycle, from tip read to commit.
pub fn ledger_commit_span(committed_tip: u64) -> Span {
    info_span!("ledger_commit", committed_tip)
}

/// Span covering one mempool lifecycle tick.
pub fn mempool_tick_span() -> Span {
    debug_span!("mempool_tick")
}

/// Span covering one resubmission tick.
pub fn resubmission_span(batch_size: usize) -> Span {
    info_span!("resubmission", batch_size)
}

/// Span covering a report handed in by one node's worker.
pub fn node_report_span(node: &str, kind: &str) -> Span {
    debug_span!("node_report", node = %node, kind = %kind)
}
