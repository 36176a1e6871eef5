//! Quorum resolution over the records nodes reported for one state version.

use gateway_types::{AccumulatorHash, CommittedTransactionRecord, NodeName};

/// Nodes agreeing on one record, with their summed trust.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionClaim {
    pub record: CommittedTransactionRecord,
    pub nodes: Vec<NodeName>,
    pub trust: f64,
}

/// Outcome of resolving one state version.
#[derive(Clone, Debug, PartialEq)]
pub struct QuorumResolution {
    pub state_version: u64,
    /// The claim with the highest summed trust; `None` when nobody reported.
    pub best: Option<TransactionClaim>,
    /// Trust summed over every claim, the best one included.
    pub total_trust_reported: f64,
    /// Nodes whose claim lost to `best`.
    pub dissenting_nodes: Vec<NodeName>,
}

impl QuorumResolution {
    pub fn best_trust(&self) -> f64 {
        self.best.as_ref().map_or(0.0, |c| c.trust)
    }

    /// Whether `node` reported anything at this state version.
    pub fn has_report_from(&self, node: &NodeName) -> bool {
        self.best.as_ref().is_some_and(|c| c.nodes.contains(node))
            || self.dissenting_nodes.contains(node)
    }
}

/// Group `records` by accumulator and pick the group with the most trust.
///
/// Ties go to the group seen first, so callers pass records in a stable
/// order (the registry order). Records from other state versions are ignored.
pub fn resolve(
    state_version: u64,
    records: &[CommittedTransactionRecord],
    trust_of: impl Fn(&NodeName) -> f64,
) -> QuorumResolution {
    let mut groups: Vec<(AccumulatorHash, TransactionClaim)> = Vec::new();

    for record in records.iter().filter(|r| r.state_version == state_version) {
        let trust = trust_of(&record.reporting_node);
        match groups
            .iter_mut()
            .find(|(acc, _)| *acc == record.accumulator_hash)
        {
            Some((_, claim)) => {
                claim.nodes.push(record.reporting_node.clone());
                claim.trust += trust;
            }
            None => groups.push((
                record.accumulator_hash,
                TransactionClaim {
                    record: record.clone(),
                    nodes: vec![record.reporting_node.clone()],
                    trust,
                },
            )),
        }
    }

    let total_trust_reported = groups.iter().map(|(_, c)| c.trust).sum();

    let mut best: Option<usize> = None;
    for (i, (_, claim)) in groups.iter().enumerate() {
        if best.map_or(true, |b| claim.trust > groups[b].1.trust) {
            best = Some(i);
        }
    }

    let mut dissenting_nodes = Vec::new();
    let mut winner = None;
    for (i, (_, claim)) in groups.into_iter().enumerate() {
        if Some(i) == best {
            winner = Some(claim);
        } else {
            dissenting_nodes.extend(claim.nodes);
        }
    }

    QuorumResolution {
        state_version,
        best: winner,
        total_trust_reported,
        dissenting_nodes,
    }
}
