//! Committed ledger records, derived summaries and confirmed extensions.

use serde::{Deserialize, Serialize};

use crate::{AccumulatorHash, NodeName, Timestamp, TxHash};

/// A node's claim about the transaction committed at one state version.
///
/// Conflicting claims for the same state version (different accumulators)
/// are compared by the quorum resolver, never merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTransactionRecord {
    pub state_version: u64,
    /// Hash the node declares for `payload`.
    pub transaction_hash: TxHash,
    pub accumulator_hash: AccumulatorHash,
    pub payload: Vec<u8>,
    /// Set when this transaction starts a new epoch.
    pub new_epoch: Option<u64>,
    /// Set when this transaction starts a new consensus round.
    pub round_timestamp: Option<Timestamp>,
    pub reporting_node: NodeName,
}

/// Ledger position after a committed transaction.
///
/// Derived deterministically from the parent summary plus a record; immutable
/// once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub state_version: u64,
    pub epoch: u64,
    pub index_in_epoch: u64,
    pub transaction_hash: TxHash,
    pub parent_accumulator: AccumulatorHash,
    pub accumulator_hash: AccumulatorHash,
    pub round_timestamp: Timestamp,
    /// Round timestamp clamped to be monotonic and never ahead of `created_at`.
    pub normalized_round_timestamp: Timestamp,
    /// Local time at which the gateway derived this summary.
    pub created_at: Timestamp,
}

impl TransactionSummary {
    /// The virtual parent of the first transaction on the ledger.
    pub fn pre_genesis() -> Self {
        Self {
            state_version: 0,
            epoch: 0,
            index_in_epoch: 0,
            transaction_hash: TxHash::ZERO,
            parent_accumulator: AccumulatorHash::ZERO,
            accumulator_hash: AccumulatorHash::ZERO,
            round_timestamp: Timestamp::EPOCH,
            normalized_round_timestamp: Timestamp::EPOCH,
            created_at: Timestamp::EPOCH,
        }
    }

    pub fn is_pre_genesis(&self) -> bool {
        self.state_version == 0
    }
}

/// One confirmed transaction with its derived summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTransaction {
    pub record: CommittedTransactionRecord,
    pub summary: TransactionSummary,
}

/// A contiguous, hash-chain-valid run of confirmed transactions starting
/// immediately after `parent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistentLedgerExtension {
    pub parent: TransactionSummary,
    pub transactions: Vec<CommittedTransaction>,
}

impl ConsistentLedgerExtension {
    pub fn empty(parent: TransactionSummary) -> Self {
        Self {
            parent,
            transactions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Summary of the last transaction, or the parent when empty.
    pub fn final_summary(&self) -> &TransactionSummary {
        self.transactions
            .last()
            .map(|tx| &tx.summary)
            .unwrap_or(&self.parent)
    }

    pub fn transaction_hashes(&self) -> impl Iterator<Item = &TxHash> {
        self.transactions.iter().map(|tx| &tx.summary.transaction_hash)
    }
}
