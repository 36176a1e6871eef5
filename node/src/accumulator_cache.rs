//! Recently-committed accumulator cache: judges whether a lagging node's
//! tip agrees with the ledger the gateway committed.
//!
//! This is a bounded FIFO map: when full, the oldest state version is evicted
//! to make room for a new insertion. Lookups are O(1) via a `HashMap`.

use std::collections::{HashMap, VecDeque};

use gateway_types::{AccumulatorHash, NodeLedgerTip};

/// How a node's reported tip relates to the committed ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TipConsistency {
    Consistent,
    Inconsistent,
    /// The tip is ahead of the committed ledger or no longer cached.
    Unknown,
}

impl TipConsistency {
    /// Value for the per-node consistency gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Consistent => 1.0,
            Self::Inconsistent => 0.0,
            Self::Unknown => crate::metrics::CONSISTENCY_UNKNOWN,
        }
    }
}

/// A bounded map of recently committed state versions to their accumulators.
pub struct RecentAccumulators {
    map: HashMap<u64, AccumulatorHash>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl RecentAccumulators {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert an accumulator, evicting the oldest entry if at capacity.
    pub fn insert(&mut self, state_version: u64, accumulator: AccumulatorHash) {
        if self.capacity == 0 {
            return;
        }
        if self.map.insert(state_version, accumulator).is_some() {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
        self.order.push_back(state_version);
    }

    pub fn get(&self, state_version: u64) -> Option<&AccumulatorHash> {
        self.map.get(&state_version)
    }

    /// Compare a node tip at or below the committed tip against the cache.
    pub fn check(&self, tip: &NodeLedgerTip, committed_tip: u64) -> TipConsistency {
        if tip.state_version > committed_tip {
            return TipConsistency::Unknown;
        }
        match self.get(tip.state_version) {
            Some(acc) if *acc == tip.accumulator_hash => TipConsistency::Consistent,
            Some(_) => TipConsistency::Inconsistent,
            None => TipConsistency::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::NodeName;

    fn acc(byte: u8) -> AccumulatorHash {
        AccumulatorHash::new([byte; 32])
    }

    fn tip(state_version: u64, byte: u8) -> NodeLedgerTip {
        NodeLedgerTip {
            node: NodeName::new("node-a").unwrap(),
            state_version,
            accumulator_hash: acc(byte),
        }
    }

    #[test]
    fn fifo_eviction_at_capacity() {
        let mut cache = RecentAccumulators::new(2);
        cache.insert(1, acc(1));
        cache.insert(2, acc(2));
        cache.insert(3, acc(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(3), Some(&acc(3)));
    }

    #[test]
    fn reinsert_does_not_grow() {
        let mut cache = RecentAccumulators::new(4);
        cache.insert(1, acc(1));
        cache.insert(1, acc(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = RecentAccumulators::new(0);
        cache.insert(1, acc(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn classifies_lagging_tips() {
        let mut cache = RecentAccumulators::new(10);
        cache.insert(5, acc(5));
        assert_eq!(cache.check(&tip(5, 5), 7), TipConsistency::Consistent);
        assert_eq!(cache.check(&tip(5, 9), 7), TipConsistency::Inconsistent);
        assert_eq!(cache.check(&tip(4, 4), 7), TipConsistency::Unknown);
        assert_eq!(cache.check(&tip(8, 8), 7), TipConsistency::Unknown);
    }
}
