//! Ledger extension builder: walks forward from the committed tip, confirming
//! one state version at a time while a claim clears the trust threshold.
//!
//! The threshold adapts to which nodes are caught up: with
//! `only_use_sufficiently_synced_up_nodes_for_quorum_calculation`, only nodes
//! whose tip is within `sufficiently_synced_state_version_threshold` of the
//! committed tip count towards the denominator.

use gateway_types::{CommittedTransactionRecord, NodeLedgerTip, NodeName};
use tracing::debug;

use crate::config::LedgerConfirmationConfig;
use crate::quorum::{resolve, QuorumResolution};
use crate::report_buffer::NodeReportBuffer;
use crate::trust::TrustRegistry;

/// Whether a node's tip is close enough to the committed tip to count.
pub fn is_sufficiently_synced(node_tip: u64, committed_tip: u64, threshold: u64) -> bool {
    node_tip != 0 && node_tip.saturating_add(threshold) > committed_tip
}

/// Trust available and required for quorum in one cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrustRequirements {
    pub available_across_all_nodes: f64,
    pub available_from_synced_nodes: f64,
    pub synced_nodes: Vec<NodeName>,
    /// Threshold a claim must reach this cycle.
    pub required_now: f64,
    /// Threshold if every voting node were synced.
    pub required_if_all_synced: f64,
}

impl TrustRequirements {
    pub fn compute(
        registry: &TrustRegistry,
        tips: &[NodeLedgerTip],
        committed_tip: u64,
        config: &LedgerConfirmationConfig,
    ) -> Self {
        let synced_nodes: Vec<NodeName> = registry
            .voting_nodes()
            .filter(|node| {
                tips.iter().any(|tip| {
                    tip.node == node.name
                        && is_sufficiently_synced(
                            tip.state_version,
                            committed_tip,
                            config.sufficiently_synced_state_version_threshold,
                        )
                })
            })
            .map(|node| node.name.clone())
            .collect();

        let available_across_all_nodes = registry.total_voting_trust();
        let available_from_synced_nodes = synced_nodes.iter().map(|n| registry.trust_of(n)).sum();

        let proportion = config.quorum_requires_trust_proportion;
        let eligible = if config.only_use_sufficiently_synced_up_nodes_for_quorum_calculation {
            available_from_synced_nodes
        } else {
            available_across_all_nodes
        };

        Self {
            available_across_all_nodes,
            available_from_synced_nodes,
            synced_nodes,
            required_now: proportion * eligible,
            required_if_all_synced: proportion * available_across_all_nodes,
        }
    }
}

/// Why the builder stopped, or that it made progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuorumStatus {
    /// At least one state version was confirmed.
    Extended { count: usize },
    /// The next claim is below threshold but more reports could confirm it.
    AwaitingReports,
    /// Even every synced node agreeing could not reach this cycle's
    /// threshold; lagging nodes must catch up first.
    AwaitingSyncedNodes,
    /// Even if every voting node reported, no claim could reach quorum: the
    /// nodes disagree irreconcilably.
    Unreachable,
    /// No voting trust is configured, or none is synced.
    NoTrustAvailable,
}

impl QuorumStatus {
    /// 1 when quorum exists, 0 when it cannot, 0.5 when not yet known.
    pub fn quorum_exists_gauge(&self) -> f64 {
        match self {
            Self::Extended { .. } => 1.0,
            Self::Unreachable => 0.0,
            Self::AwaitingReports | Self::AwaitingSyncedNodes | Self::NoTrustAvailable => 0.5,
        }
    }

    /// Whether an operator should be paged.
    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Unreachable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extended { .. } => "extended",
            Self::AwaitingReports => "awaiting_reports",
            Self::AwaitingSyncedNodes => "awaiting_synced_nodes",
            Self::Unreachable => "unreachable",
            Self::NoTrustAvailable => "no_trust_available",
        }
    }
}

/// Records confirmed by quorum in one cycle, not yet chain-checked.
#[derive(Clone, Debug)]
pub struct ExtensionProposal {
    pub records: Vec<CommittedTransactionRecord>,
    pub status: QuorumStatus,
    pub requirements: TrustRequirements,
    /// Resolution of the first state version that was not confirmed.
    pub stalled_at: Option<QuorumResolution>,
    /// Nodes that agreed with every confirmed record they reported.
    pub consistent_nodes: Vec<NodeName>,
    /// Nodes outvoted at some confirmed state version.
    pub inconsistent_nodes: Vec<NodeName>,
}

/// Builds extension proposals from buffered reports.
pub struct ExtensionBuilder<'a> {
    registry: &'a TrustRegistry,
    buffer: &'a NodeReportBuffer,
    config: &'a LedgerConfirmationConfig,
}

impl<'a> ExtensionBuilder<'a> {
    pub fn new(
        registry: &'a TrustRegistry,
        buffer: &'a NodeReportBuffer,
        config: &'a LedgerConfirmationConfig,
    ) -> Self {
        Self {
            registry,
            buffer,
            config,
        }
    }

    /// Confirm as many state versions after `committed_tip` as quorum allows,
    /// up to `max_commit_batch_size`.
    pub fn propose(&self, committed_tip: u64) -> ExtensionProposal {
        let tips = self.buffer.ledger_tips();
        let requirements = TrustRequirements::compute(self.registry, &tips, committed_tip, self.config);

        let mut proposal = ExtensionProposal {
            records: Vec::new(),
            status: QuorumStatus::NoTrustAvailable,
            requirements,
            stalled_at: None,
            consistent_nodes: Vec::new(),
            inconsistent_nodes: Vec::new(),
        };

        if proposal.requirements.available_across_all_nodes <= 0.0
            || proposal.requirements.required_now <= 0.0
        {
            return proposal;
        }

        let mut agreeing: Vec<NodeName> = Vec::new();
        let mut dissenting: Vec<NodeName> = Vec::new();
        let mut stop_reason = None;

        let last = committed_tip.saturating_add(self.config.max_commit_batch_size);
        for state_version in committed_tip + 1..=last {
            let records = self.buffer.records_at(state_version);
            let resolution = resolve(state_version, &records, |n| self.registry.trust_of(n));

            match resolution.best.as_ref() {
                Some(best) if best.trust >= proposal.requirements.required_now => {
                    agreeing.extend(best.nodes.iter().cloned());
                    dissenting.extend(resolution.dissenting_nodes.iter().cloned());
                    proposal.records.push(best.record.clone());
                }
                _ => {
                    let reason = self.classify_stall(&resolution, &proposal.requirements);
                    debug!(
                        state_version,
                        best_trust = resolution.best_trust(),
                        required = proposal.requirements.required_now,
                        reason = reason.as_str(),
                        "ledger extension stopped"
                    );
                    stop_reason = Some(reason);
                    proposal.stalled_at = Some(resolution);
                    break;
                }
            }
        }

        dissenting.sort();
        dissenting.dedup();
        agreeing.sort();
        agreeing.dedup();
        agreeing.retain(|n| !dissenting.contains(n));
        proposal.consistent_nodes = agreeing;
        proposal.inconsistent_nodes = dissenting;

        proposal.status = if proposal.records.is_empty() {
            stop_reason.unwrap_or(QuorumStatus::AwaitingReports)
        } else {
            QuorumStatus::Extended {
                count: proposal.records.len(),
            }
        };
        proposal
    }

    fn classify_stall(
        &self,
        resolution: &QuorumResolution,
        requirements: &TrustRequirements,
    ) -> QuorumStatus {
        let best = resolution.best_trust();
        let unreported = |only_synced: bool| -> f64 {
            self.registry
                .voting_nodes()
                .filter(|n| !resolution.has_report_from(&n.name))
                .filter(|n| !only_synced || requirements.synced_nodes.contains(&n.name))
                .map(|n| n.trust_weight)
                .sum()
        };

        if best + unreported(false) < requirements.required_if_all_synced {
            QuorumStatus::Unreachable
        } else if best + unreported(true) < requirements.required_now {
            QuorumStatus::AwaitingSyncedNodes
        } else {
            QuorumStatus::AwaitingReports
        }
    }
}
