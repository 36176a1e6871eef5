//! Entity classification from bech32-style entity addresses.
//!
//! Addresses look like `account_rdx1q...`: an entity prefix, a network
//! suffix, the `1` separator and a data part in the bech32 alphabet. Only the
//! shape is checked here, not the checksum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{NetworkId, TypesError};

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Closed set of on-ledger entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    Identity,
    Validator,
    Resource,
    Package,
    Component,
    ConsensusManager,
    AccessController,
    InternalVault,
    InternalKeyValueStore,
    InternalComponent,
}

impl EntityKind {
    /// Human-readable-part prefixes, checked in order.
    const PREFIXES: [(&'static str, EntityKind); 11] = [
        ("account_", Self::Account),
        ("identity_", Self::Identity),
        ("validator_", Self::Validator),
        ("resource_", Self::Resource),
        ("package_", Self::Package),
        ("component_", Self::Component),
        ("consensusmanager_", Self::ConsensusManager),
        ("accesscontroller_", Self::AccessController),
        ("internal_vault_", Self::InternalVault),
        ("internal_keyvaluestore_", Self::InternalKeyValueStore),
        ("internal_component_", Self::InternalComponent),
    ];

    pub fn prefix(&self) -> &'static str {
        Self::PREFIXES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(prefix, _)| *prefix)
            .unwrap_or_default()
    }

    /// Whether entities of this kind have a global address.
    pub fn is_global(&self) -> bool {
        !matches!(
            self,
            Self::InternalVault | Self::InternalKeyValueStore | Self::InternalComponent
        )
    }
}

/// A parsed entity address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityAddress {
    kind: EntityKind,
    network: NetworkId,
    raw: String,
}

impl EntityAddress {
    /// Classify `address` by its human-readable part.
    pub fn parse(address: &str) -> Result<Self, TypesError> {
        let malformed = || TypesError::MalformedAddress(address.to_string());

        let (hrp, data) = address.rsplit_once('1').ok_or_else(malformed)?;
        if data.is_empty() || !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(malformed());
        }

        let (kind, suffix) = EntityKind::PREFIXES
            .iter()
            .find_map(|(prefix, kind)| hrp.strip_prefix(prefix).map(|rest| (*kind, rest)))
            .ok_or_else(|| TypesError::UnknownEntityPrefix(hrp.to_string()))?;

        let network = NetworkId::ALL
            .into_iter()
            .find(|n| n.hrp_suffix() == suffix)
            .ok_or_else(|| TypesError::UnknownNetwork(suffix.to_string()))?;

        Ok(Self {
            kind,
            network,
            raw: address.to_string(),
        })
    }

    /// Parse and require the address to belong to `expected`.
    pub fn parse_for_network(address: &str, expected: NetworkId) -> Result<Self, TypesError> {
        let parsed = Self::parse(address)?;
        if parsed.network != expected {
            return Err(TypesError::WrongNetwork {
                address: address.to_string(),
                found: parsed.network.as_str().to_string(),
                expected: expected.as_str().to_string(),
            });
        }
        Ok(parsed)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EntityAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_account() {
        let a = EntityAddress::parse("account_rdx1qspx7zxmnrh36q33av24srdfzg7m3cj65968erpjuh7ja3rm3kmn6hq").unwrap();
        assert_eq!(a.kind(), EntityKind::Account);
        assert_eq!(a.network(), NetworkId::Mainnet);
        assert!(a.kind().is_global());
    }

    #[test]
    fn internal_prefix_is_not_confused_with_component() {
        let a = EntityAddress::parse("internal_component_tdx_2_1cqqqqqqqqqqqqqqqq").unwrap();
        assert_eq!(a.kind(), EntityKind::InternalComponent);
        assert_eq!(a.network(), NetworkId::Stokenet);
        assert!(!a.kind().is_global());
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(matches!(
            EntityAddress::parse("wallet_rdx1qqqq"),
            Err(TypesError::UnknownEntityPrefix(_))
        ));
    }

    #[test]
    fn rejects_missing_separator_and_bad_charset() {
        assert!(matches!(
            EntityAddress::parse("account_rdx"),
            Err(TypesError::MalformedAddress(_))
        ));
        assert!(matches!(
            EntityAddress::parse("account_rdx1qqbq"),
            Err(TypesError::MalformedAddress(_))
        ));
    }

    #[test]
    fn enforces_expected_network() {
        let err = EntityAddress::parse_for_network("resource_loc1qqqq", NetworkId::Mainnet)
            .unwrap_err();
        assert!(matches!(err, TypesError::WrongNetwork { .. }));
    }

    #[test]
    fn prefix_roundtrips_kind() {
        assert_eq!(EntityKind::Validator.prefix(), "validator_");
    }
}
