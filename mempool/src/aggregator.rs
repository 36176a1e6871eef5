//! Mempool aggregator: per-node mempool snapshots merged into one view.
//!
//! Each node's latest snapshot replaces the previous one wholesale. Snapshots
//! older than the staleness window are ignored when combining, and if none
//! are fresh there is nothing safe to merge.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use gateway_types::{MempoolTransaction, NodeName, Timestamp, TxHash};
use tracing::debug;

use crate::MempoolError;

/// A transaction as one node's mempool reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MempoolEntry {
    pub payload: Vec<u8>,
    /// When the node first saw the transaction.
    pub first_seen: Timestamp,
}

/// Everything one node had in its mempool at `observed_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeMempoolSnapshot {
    pub node: NodeName,
    pub observed_at: Timestamp,
    pub transactions: HashMap<TxHash, MempoolEntry>,
}

/// The merged view over every fresh snapshot.
#[derive(Clone, Debug, Default)]
pub struct CombinedMempool {
    pub transactions: HashMap<TxHash, MempoolEntry>,
    pub fresh_nodes: Vec<NodeName>,
    pub stale_nodes: Vec<NodeName>,
}

impl CombinedMempool {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &TxHash) -> bool {
        self.transactions.contains_key(id)
    }

    pub fn ids(&self) -> HashSet<TxHash> {
        self.transactions.keys().copied().collect()
    }

    /// Rows to upsert with the observed-in-mempool merge policy. Unknown
    /// transactions start at their first-seen time; known ones have
    /// `last_seen` refreshed to `now`.
    pub fn observed_rows(&self, now: Timestamp) -> Vec<MempoolTransaction> {
        let mut rows: Vec<MempoolTransaction> = self
            .transactions
            .iter()
            .map(|(id, entry)| {
                let mut tx = MempoolTransaction::observed(*id, entry.payload.clone(), entry.first_seen);
                tx.last_seen_in_mempool_at = Some(now.max(entry.first_seen));
                tx
            })
            .collect();
        rows.sort_by_key(|tx| tx.id);
        rows
    }
}

/// Latest mempool snapshot per configured node.
pub struct MempoolAggregator {
    nodes: Vec<(NodeName, Mutex<Option<NodeMempoolSnapshot>>)>,
    index: HashMap<NodeName, usize>,
}

impl MempoolAggregator {
    pub fn new(nodes: impl IntoIterator<Item = NodeName>) -> Self {
        let mut aggregator = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        for name in nodes {
            if aggregator.index.contains_key(&name) {
                continue;
            }
            aggregator.index.insert(name.clone(), aggregator.nodes.len());
            aggregator.nodes.push((name, Mutex::new(None)));
        }
        aggregator
    }

    fn lock(slot: &Mutex<Option<NodeMempoolSnapshot>>) -> MutexGuard<'_, Option<NodeMempoolSnapshot>> {
        slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the node's snapshot. An older snapshot never replaces a newer one.
    pub fn report_snapshot(&self, snapshot: NodeMempoolSnapshot) -> Result<(), MempoolError> {
        let i = self
            .index
            .get(&snapshot.node)
            .ok_or_else(|| MempoolError::UnknownNode(snapshot.node.to_string()))?;
        let mut slot = Self::lock(&self.nodes[*i].1);
        if slot
            .as_ref()
            .map_or(true, |current| current.observed_at <= snapshot.observed_at)
        {
            *slot = Some(snapshot);
        } else {
            debug!(node = %snapshot.node, "ignoring out-of-order mempool snapshot");
        }
        Ok(())
    }

    /// Merge every snapshot observed within `staleness` of `now`.
    ///
    /// When several nodes report a transaction, the entry with the latest
    /// first-seen time wins.
    pub fn combine(&self, now: Timestamp, staleness: Duration) -> Result<CombinedMempool, MempoolError> {
        let mut combined = CombinedMempool::default();

        for (name, slot) in &self.nodes {
            let slot = Self::lock(slot);
            let Some(snapshot) = slot.as_ref() else {
                combined.stale_nodes.push(name.clone());
                continue;
            };
            if snapshot.observed_at.has_expired(staleness, now) {
                debug!(
                    node = %name,
                    observed_at = snapshot.observed_at.as_millis(),
                    "discarding stale mempool snapshot"
                );
                combined.stale_nodes.push(name.clone());
                continue;
            }
            combined.fresh_nodes.push(name.clone());

            for (id, entry) in &snapshot.transactions {
                match combined.transactions.get(id) {
                    Some(existing) if existing.first_seen >= entry.first_seen => {}
                    _ => {
                        combined.transactions.insert(*id, entry.clone());
                    }
                }
            }
        }

        if combined.fresh_nodes.is_empty() {
            return Err(MempoolError::NoFreshSnapshots {
                configured: self.nodes.len(),
            });
        }
        Ok(combined)
    }
}
