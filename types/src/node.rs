//! Node identity and reported ledger tip.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccumulatorHash, TypesError};

/// Configured name of an upstream full node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, TypesError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(TypesError::InvalidNodeName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeName({})", self.0)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest ledger tip a node has reported. Last value wins; no history is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLedgerTip {
    pub node: NodeName,
    pub state_version: u64,
    pub accumulator_hash: AccumulatorHash,
}
