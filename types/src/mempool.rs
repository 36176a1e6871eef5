//! Tracked mempool transactions and their lifecycle state machine.
//!
//! A transaction's status is driven exclusively by [`LifecycleEvent`]s through
//! [`MempoolStatus::transition`]. Every event is derived from an observation
//! (mempool presence, local submission, resubmission outcome, ledger commit),
//! so replaying a transaction's observation history always reproduces the same
//! status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{NodeName, Timestamp, TxHash};

/// Lifecycle status of a tracked transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MempoolStatus {
    /// Present in at least one node's recent mempool, or just (re)submitted.
    InNodeMempool,
    /// Dropped out of every node's mempool.
    Missing,
    /// A resubmission hit a conflict before the ledger caught up, so it is not
    /// yet known whether the conflict was this transaction committing.
    ResolvedButUnknown,
    /// Permanently failed. Terminal.
    Failed,
    /// Seen on the committed ledger. Terminal.
    Committed,
}

/// Why a transaction was marked [`MempoolStatus::Failed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    DoubleSpend,
    Timeout,
    Unknown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DoubleSpend => "double_spend",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        })
    }
}

/// An observation that may move a transaction through its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Present in a fresh mempool snapshot.
    SeenInMempool,
    /// Submitted to a node by this gateway on behalf of a client.
    SubmittedToGateway,
    /// Absent from every fresh mempool snapshot.
    DroppedFromMempools,
    /// The resubmission time budget has run out.
    ResubmissionWindowExhausted,
    /// A node accepted a resubmission (or already knew the transaction).
    ResubmissionAccepted,
    /// A node rejected a resubmission because an input was already consumed.
    ResubmissionConflict { ledger_caught_up: bool },
    /// A node rejected a resubmission for any other definitive reason.
    ResubmissionRejected,
    /// The resubmission outcome is unknown (timeout, transport failure).
    ResubmissionInconclusive,
    /// The committed ledger contains this transaction.
    CommittedOnLedger,
}

impl MempoolStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Committed)
    }

    /// Whether the transaction is waiting to be resubmitted.
    pub fn awaits_resubmission(&self) -> bool {
        matches!(self, Self::Missing | Self::ResolvedButUnknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InNodeMempool => "in_node_mempool",
            Self::Missing => "missing",
            Self::ResolvedButUnknown => "resolved_but_unknown",
            Self::Failed => "failed",
            Self::Committed => "committed",
        }
    }

    /// The status after `event`, with the failure reason when it fails.
    ///
    /// Events that do not apply to the current status leave it unchanged. A
    /// transaction only fails from a resubmission-awaiting status, so
    /// `InNodeMempool` always passes through `Missing` first.
    pub fn transition(self, event: LifecycleEvent) -> (MempoolStatus, Option<FailureReason>) {
        use LifecycleEvent as E;
        use MempoolStatus as S;

        match (self, event) {
            (_, E::CommittedOnLedger) => (S::Committed, None),
            (s, _) if s.is_terminal() => (s, None),

            (_, E::SeenInMempool | E::SubmittedToGateway) => (S::InNodeMempool, None),
            (S::InNodeMempool, E::DroppedFromMempools | E::ResubmissionWindowExhausted) => {
                (S::Missing, None)
            }

            (S::Missing | S::ResolvedButUnknown, event) => match event {
                E::ResubmissionWindowExhausted => (S::Failed, Some(FailureReason::Timeout)),
                E::ResubmissionAccepted => (S::InNodeMempool, None),
                E::ResubmissionConflict {
                    ledger_caught_up: true,
                } => (S::Failed, Some(FailureReason::DoubleSpend)),
                E::ResubmissionConflict {
                    ledger_caught_up: false,
                } => (S::ResolvedButUnknown, None),
                E::ResubmissionRejected => (S::Failed, Some(FailureReason::Unknown)),
                _ => (self, None),
            },

            (s, _) => (s, None),
        }
    }
}

impl fmt::Display for MempoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure details recorded alongside [`MempoolStatus::Failed`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolFailure {
    pub reason: FailureReason,
    pub explanation: String,
    pub at: Timestamp,
}

/// A pending transaction tracked across node mempools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolTransaction {
    /// Content hash of `payload`.
    pub id: TxHash,
    pub payload: Vec<u8>,
    pub status: MempoolStatus,

    pub submitted_by_this_gateway: bool,
    pub first_submitted_to_gateway_at: Option<Timestamp>,
    pub last_submitted_to_gateway_at: Option<Timestamp>,
    pub last_submitted_to_node_at: Option<Timestamp>,
    pub last_submitted_to_node: Option<NodeName>,
    pub submission_count: u32,

    pub first_seen_in_mempool_at: Option<Timestamp>,
    pub last_seen_in_mempool_at: Option<Timestamp>,
    pub last_dropped_out_of_mempool_at: Option<Timestamp>,

    pub committed_state_version: Option<u64>,
    pub committed_at: Option<Timestamp>,
    pub failure: Option<MempoolFailure>,

    /// Bumped by the store on every write of an existing row. Lifecycle
    /// updates carry the revision they were computed from.
    pub revision: u64,
}

impl MempoolTransaction {
    /// A transaction first observed in a node mempool at `seen_at`.
    pub fn observed(id: TxHash, payload: Vec<u8>, seen_at: Timestamp) -> Self {
        Self {
            id,
            payload,
            status: MempoolStatus::InNodeMempool,
            submitted_by_this_gateway: false,
            first_submitted_to_gateway_at: None,
            last_submitted_to_gateway_at: None,
            last_submitted_to_node_at: None,
            last_submitted_to_node: None,
            submission_count: 0,
            first_seen_in_mempool_at: Some(seen_at),
            last_seen_in_mempool_at: Some(seen_at),
            last_dropped_out_of_mempool_at: None,
            committed_state_version: None,
            committed_at: None,
            failure: None,
            revision: 0,
        }
    }

    /// A transaction this gateway has just submitted to `node`.
    pub fn submitted_locally(
        id: TxHash,
        payload: Vec<u8>,
        node: NodeName,
        now: Timestamp,
    ) -> Self {
        let mut tx = Self::observed(id, payload, now);
        tx.first_seen_in_mempool_at = None;
        tx.last_seen_in_mempool_at = None;
        tx.mark_submitted_to_gateway(now);
        tx.mark_submitted_to_node(node, now);
        tx
    }

    fn apply(&mut self, event: LifecycleEvent, explanation: &str, now: Timestamp) -> bool {
        let (status, failure) = self.status.transition(event);
        let changed = status != self.status;
        self.status = status;
        if let Some(reason) = failure {
            self.failure = Some(MempoolFailure {
                reason,
                explanation: explanation.to_string(),
                at: now,
            });
        }
        changed
    }

    /// Record presence in a fresh mempool snapshot. Returns whether the
    /// transaction reappeared after having been missing.
    pub fn mark_seen(&mut self, seen_at: Timestamp) -> bool {
        let was_missing = self.status.awaits_resubmission();
        self.apply(LifecycleEvent::SeenInMempool, "", seen_at);
        if self.first_seen_in_mempool_at.is_none() {
            self.first_seen_in_mempool_at = Some(seen_at);
        }
        self.last_seen_in_mempool_at = Some(
            self.last_seen_in_mempool_at
                .map_or(seen_at, |last| last.max(seen_at)),
        );
        was_missing && self.status == MempoolStatus::InNodeMempool
    }

    /// Record absence from every fresh mempool snapshot.
    pub fn mark_missing(&mut self, now: Timestamp) {
        if self.apply(LifecycleEvent::DroppedFromMempools, "", now) {
            self.last_dropped_out_of_mempool_at = Some(now);
        }
    }

    pub fn mark_submitted_to_gateway(&mut self, now: Timestamp) {
        self.apply(LifecycleEvent::SubmittedToGateway, "", now);
        self.submitted_by_this_gateway = true;
        if self.first_submitted_to_gateway_at.is_none() {
            self.first_submitted_to_gateway_at = Some(now);
        }
        self.last_submitted_to_gateway_at = Some(now);
    }

    /// Record a submission attempt to a node, whatever its outcome.
    pub fn mark_submitted_to_node(&mut self, node: NodeName, now: Timestamp) {
        self.last_submitted_to_node_at = Some(now);
        self.last_submitted_to_node = Some(node);
        self.submission_count = self.submission_count.saturating_add(1);
    }

    /// Apply a resubmission or timeout outcome, recording failure details when
    /// the transaction fails as a result.
    pub fn record_outcome(
        &mut self,
        event: LifecycleEvent,
        explanation: impl AsRef<str>,
        now: Timestamp,
    ) {
        let was_in_mempool = self.status == MempoolStatus::InNodeMempool;
        self.apply(event, explanation.as_ref(), now);
        if was_in_mempool && self.status == MempoolStatus::Missing {
            self.last_dropped_out_of_mempool_at = Some(now);
        }
    }

    pub fn mark_committed(&mut self, state_version: u64, committed_at: Timestamp) {
        self.apply(LifecycleEvent::CommittedOnLedger, "", committed_at);
        self.committed_state_version = Some(state_version);
        self.committed_at = Some(committed_at);
    }

    /// Stamp a row about to overwrite the stored revision `stored`.
    pub fn written_over(mut self, stored: u64) -> Self {
        self.revision = stored.wrapping_add(1);
        self
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure.as_ref().map(|f| f.reason)
    }
}
