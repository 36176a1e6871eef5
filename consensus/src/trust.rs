//! Trust registry: static per-node trust weights and health flags.
//!
//! Nodes are kept in configuration order. Every iteration over the registry
//! follows that order, which makes quorum tie-breaking deterministic.

use gateway_types::NodeName;
use serde::{Deserialize, Serialize};

use crate::ConsensusError;

/// Configured standing of one upstream node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeTrust {
    pub name: NodeName,
    /// How much this node's reports count towards quorum.
    pub trust_weight: f64,
    /// Relative likelihood of being picked for a submission.
    pub request_weight: f64,
    pub enabled: bool,
    pub indexing_enabled: bool,
    pub submission_enabled: bool,
}

impl NodeTrust {
    /// Whether this node's ledger reports count towards quorum.
    pub fn votes(&self) -> bool {
        self.enabled && self.indexing_enabled && self.trust_weight > 0.0
    }

    /// Whether transactions may be submitted through this node.
    pub fn accepts_submissions(&self) -> bool {
        self.enabled && self.submission_enabled && self.request_weight > 0.0
    }
}

/// Per-node trust, fixed for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct TrustRegistry {
    nodes: Vec<NodeTrust>,
}

impl TrustRegistry {
    pub fn new(nodes: Vec<NodeTrust>) -> Result<Self, ConsensusError> {
        for (i, node) in nodes.iter().enumerate() {
            if nodes[..i].iter().any(|other| other.name == node.name) {
                return Err(ConsensusError::DuplicateNode(node.name.to_string()));
            }
            for weight in [node.trust_weight, node.request_weight] {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ConsensusError::InvalidTrustWeight {
                        node: node.name.to_string(),
                        weight,
                    });
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn get(&self, name: &NodeName) -> Option<&NodeTrust> {
        self.nodes.iter().find(|n| &n.name == name)
    }

    /// All configured nodes, in configuration order.
    pub fn nodes(&self) -> &[NodeTrust] {
        &self.nodes
    }

    /// Nodes whose reports count towards quorum.
    pub fn voting_nodes(&self) -> impl Iterator<Item = &NodeTrust> {
        self.nodes.iter().filter(|n| n.votes())
    }

    /// Nodes eligible for transaction submission.
    pub fn submission_nodes(&self) -> impl Iterator<Item = &NodeTrust> {
        self.nodes.iter().filter(|n| n.accepts_submissions())
    }

    /// Trust a report from `name` carries. Zero for non-voting or unknown nodes.
    pub fn trust_of(&self, name: &NodeName) -> f64 {
        self.get(name)
            .filter(|n| n.votes())
            .map_or(0.0, |n| n.trust_weight)
    }

    /// Total trust across every voting node.
    pub fn total_voting_trust(&self) -> f64 {
        self.voting_nodes().map(|n| n.trust_weight).sum()
    }
}
