//! Summary derivation and hash-chain checks for confirmed transactions.
//!
//! Confirmed records are threaded through [`derive_summary`] one by one. Each
//! must sit exactly one state version above its parent, hash to its declared
//! transaction hash, and chain the parent's accumulator to its declared one.

use gateway_crypto::{hash_transaction, next_accumulator};
use gateway_types::{
    CommittedTransaction, CommittedTransactionRecord, ConsistentLedgerExtension, Timestamp,
    TransactionSummary,
};

use crate::ConsensusError;

/// Derive the summary of `record` on top of `parent`.
///
/// Does not check the record; see [`check_child`].
pub fn derive_summary(
    parent: &TransactionSummary,
    record: &CommittedTransactionRecord,
    created_at: Timestamp,
) -> TransactionSummary {
    let (epoch, index_in_epoch) = match record.new_epoch {
        Some(epoch) => (epoch, 0),
        None => (parent.epoch, parent.index_in_epoch + 1),
    };

    let round_timestamp = record
        .round_timestamp
        .filter(|t| !t.is_epoch())
        .unwrap_or(parent.round_timestamp);

    // Monotonic, and never ahead of the local clock.
    let normalized_round_timestamp = round_timestamp
        .max(parent.normalized_round_timestamp)
        .min(created_at.max(parent.normalized_round_timestamp));

    TransactionSummary {
        state_version: record.state_version,
        epoch,
        index_in_epoch,
        transaction_hash: record.transaction_hash,
        parent_accumulator: parent.accumulator_hash,
        accumulator_hash: record.accumulator_hash,
        round_timestamp,
        normalized_round_timestamp,
        created_at,
    }
}

/// Check that `record` is a valid successor of `parent`.
pub fn check_child(
    parent: &TransactionSummary,
    record: &CommittedTransactionRecord,
) -> Result<(), ConsensusError> {
    let expected = parent.state_version + 1;
    if record.state_version != expected {
        return Err(ConsensusError::NonContiguousStateVersion {
            expected,
            found: record.state_version,
        });
    }

    let computed = hash_transaction(&record.payload);
    if computed != record.transaction_hash {
        return Err(ConsensusError::TransactionHashMismatch {
            state_version: record.state_version,
            declared: record.transaction_hash.to_string(),
            computed: computed.to_string(),
        });
    }

    let chained = next_accumulator(&parent.accumulator_hash, &record.transaction_hash);
    if chained != record.accumulator_hash {
        return Err(ConsensusError::AccumulatorMismatch {
            state_version: record.state_version,
            declared: record.accumulator_hash.to_string(),
            computed: chained.to_string(),
        });
    }
    Ok(())
}

/// Turn confirmed records into a hash-chain-valid extension of `parent`.
///
/// Fails on the first record that does not chain; nothing partial is returned.
pub fn build_consistent_extension(
    parent: TransactionSummary,
    records: Vec<CommittedTransactionRecord>,
    created_at: Timestamp,
) -> Result<ConsistentLedgerExtension, ConsensusError> {
    let mut transactions: Vec<CommittedTransaction> = Vec::with_capacity(records.len());

    for record in records {
        let previous = transactions.last().map_or(&parent, |tx| &tx.summary);
        check_child(previous, &record)?;
        let summary = derive_summary(previous, &record, created_at);
        transactions.push(CommittedTransaction { record, summary });
    }

    Ok(ConsistentLedgerExtension {
        parent,
        transactions,
    })
}
