//! Node report buffer: per-node ledger tips and reported transactions.
//!
//! Reporting workers write concurrently, one node each. Every node owns its
//! own lock; the node set is fixed at construction, so there is no lock over
//! the whole buffer. The confirmation loop reads across nodes in registry
//! order and prunes after each commit.
//!
//! Each node's buffer is bounded twice: records past the fetch window are
//! dropped, and a node stops buffering once its payloads reach the byte
//! budget. Both bounds hold no matter what a reporter sends.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use gateway_types::{CommittedTransactionRecord, NodeLedgerTip, NodeName};

use crate::ConsensusError;

#[derive(Default)]
struct NodeReports {
    tip: Option<NodeLedgerTip>,
    records: BTreeMap<u64, CommittedTransactionRecord>,
    payload_bytes: usize,
}

impl NodeReports {
    fn retain_above(&mut self, state_version: u64) {
        self.records = self.records.split_off(&state_version.saturating_add(1));
        self.payload_bytes = self.records.values().map(|r| r.payload.len()).sum();
    }
}

/// In-memory holding area for what each node has reported.
pub struct NodeReportBuffer {
    nodes: Vec<(NodeName, Mutex<NodeReports>)>,
    index: HashMap<NodeName, usize>,
    /// Records at or below this state version are committed and discarded.
    pruned_through: AtomicU64,
    /// State versions past `pruned_through` a node may buffer.
    pipeline_depth: u64,
    max_payload_bytes: usize,
}

impl NodeReportBuffer {
    /// Create an unbounded buffer for `nodes`, in the order quorum ties are broken.
    pub fn new(nodes: impl IntoIterator<Item = NodeName>) -> Self {
        Self::with_limits(nodes, u64::MAX, usize::MAX)
    }

    /// Create a buffer holding at most `pipeline_depth` state versions past
    /// the committed tip, and roughly `max_payload_bytes` of payload, per node.
    pub fn with_limits(
        nodes: impl IntoIterator<Item = NodeName>,
        pipeline_depth: u64,
        max_payload_bytes: usize,
    ) -> Self {
        let mut buffer = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            pruned_through: AtomicU64::new(0),
            pipeline_depth,
            max_payload_bytes,
        };
        for name in nodes {
            if buffer.index.contains_key(&name) {
                continue;
            }
            buffer.index.insert(name.clone(), buffer.nodes.len());
            buffer.nodes.push((name, Mutex::new(NodeReports::default())));
        }
        buffer
    }

    fn reports(&self, node: &NodeName) -> Result<MutexGuard<'_, NodeReports>, ConsensusError> {
        let i = self
            .index
            .get(node)
            .ok_or_else(|| ConsensusError::UnknownNode(node.to_string()))?;
        // A poisoned lock only means a reporter panicked mid-update; the
        // buffered data is still a valid snapshot.
        Ok(self.nodes[*i]
            .1
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn each_node(&self) -> impl Iterator<Item = (&NodeName, MutexGuard<'_, NodeReports>)> {
        self.nodes.iter().map(|(name, reports)| {
            (
                name,
                reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            )
        })
    }

    /// Record a node's latest ledger tip. Last write wins.
    pub fn report_ledger_tip(&self, tip: NodeLedgerTip) -> Result<(), ConsensusError> {
        let mut reports = self.reports(&tip.node)?;
        reports.tip = Some(tip);
        Ok(())
    }

    /// Buffer committed transactions reported by `node`.
    ///
    /// The node must have reported its tip first. Records at or below the
    /// committed tip, or beyond the fetch window, are dropped; so is
    /// everything after the node's buffer reaches its byte budget. The record
    /// that crosses the budget is kept, so a single oversized transaction can
    /// still be confirmed. Returns how many records were buffered.
    pub fn report_transactions(
        &self,
        node: &NodeName,
        records: Vec<CommittedTransactionRecord>,
    ) -> Result<usize, ConsensusError> {
        let mut reports = self.reports(node)?;
        if reports.tip.is_none() {
            return Err(ConsensusError::TipNotReported(node.to_string()));
        }

        let floor = self.pruned_through.load(Ordering::Acquire);
        let ceiling = floor.saturating_add(self.pipeline_depth);
        let mut buffered = 0;
        for mut record in records {
            if record.state_version <= floor || record.state_version > ceiling {
                continue;
            }
            if reports.payload_bytes >= self.max_payload_bytes {
                break;
            }
            record.reporting_node = node.clone();
            let added = record.payload.len();
            if let Some(replaced) = reports.records.insert(record.state_version, record) {
                reports.payload_bytes -= replaced.payload.len();
            }
            reports.payload_bytes += added;
            buffered += 1;
        }
        Ok(buffered)
    }

    pub fn ledger_tip(&self, node: &NodeName) -> Option<NodeLedgerTip> {
        self.reports(node).ok().and_then(|r| r.tip.clone())
    }

    /// Every reported tip, in registry order.
    pub fn ledger_tips(&self) -> Vec<NodeLedgerTip> {
        self.each_node().filter_map(|(_, r)| r.tip.clone()).collect()
    }

    /// Records reported for `state_version`, in registry order.
    pub fn records_at(&self, state_version: u64) -> Vec<CommittedTransactionRecord> {
        self.each_node()
            .filter_map(|(_, r)| r.records.get(&state_version).cloned())
            .collect()
    }

    /// The range a node should fetch next as `(exclusive_lower, inclusive_upper)`.
    ///
    /// The window starts at the committed tip and spans the pipeline depth.
    /// Fetching resumes just before the first version the node has not yet
    /// reported; `None` means the window is already full or the node's byte
    /// budget is spent.
    pub fn requested_range(
        &self,
        node: &NodeName,
        committed_tip: u64,
    ) -> Result<Option<(u64, u64)>, ConsensusError> {
        let reports = self.reports(node)?;
        if reports.payload_bytes >= self.max_payload_bytes {
            return Ok(None);
        }
        let upper = committed_tip.saturating_add(self.pipeline_depth);

        let mut expected = committed_tip + 1;
        for version in reports.records.range(expected..=upper).map(|(v, _)| *v) {
            if version != expected {
                break;
            }
            expected += 1;
        }

        if expected > upper {
            return Ok(None);
        }
        // Gaps are refetched from the first one onwards, so a hole at the last
        // slot alone still yields `(upper - 1, upper)` rather than `None`.
        Ok(Some((expected - 1, upper)))
    }

    /// Discard every record at or below `state_version`, now and for late reports.
    pub fn prune_through(&self, state_version: u64) {
        self.pruned_through.fetch_max(state_version, Ordering::AcqRel);
        for (_, mut reports) in self.each_node() {
            reports.retain_above(state_version);
        }
    }

    pub fn buffered_count(&self, node: &NodeName) -> usize {
        self.reports(node).map_or(0, |r| r.records.len())
    }

    /// Payload bytes currently buffered for `node`.
    pub fn buffered_bytes(&self, node: &NodeName) -> usize {
        self.reports(node).map_or(0, |r| r.payload_bytes)
    }

    /// Lowest buffered state version across all nodes.
    pub fn lowest_buffered_version(&self) -> Option<u64> {
        self.each_node()
            .filter_map(|(_, r)| r.records.keys().next().copied())
            .min()
    }
}
