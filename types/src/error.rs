//! Error type for value parsing and lifecycle bookkeeping.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid node name: {0:?}")]
    InvalidNodeName(String),

    #[error("malformed entity address: {0}")]
    MalformedAddress(String),

    #[error("unknown entity address prefix: {0}")]
    UnknownEntityPrefix(String),

    #[error("address {address} belongs to network {found}, expected {expected}")]
    WrongNetwork {
        address: String,
        found: String,
        expected: String,
    },

    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}
