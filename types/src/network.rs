//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TypesError;

/// Identifies which ledger network the gateway indexes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    #[default]
    Mainnet,
    /// The public test network.
    Stokenet,
    /// Local development network.
    Localnet,
}

impl NetworkId {
    pub const ALL: [NetworkId; 3] = [Self::Mainnet, Self::Stokenet, Self::Localnet];

    /// Logical network name sent to node APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Stokenet => "stokenet",
            Self::Localnet => "localnet",
        }
    }

    /// Network-specific suffix of the human-readable part of entity addresses.
    pub fn hrp_suffix(&self) -> &'static str {
        match self {
            Self::Mainnet => "rdx",
            Self::Stokenet => "tdx_2_",
            Self::Localnet => "loc",
        }
    }
}

impl FromStr for NetworkId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypesError::UnknownNetwork(s.to_string()))
    }
}
