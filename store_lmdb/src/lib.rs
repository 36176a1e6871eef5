//! LMDB storage backend for the gateway.
//!
//! Implements the storage traits from `gateway-store` using the `heed` LMDB
//! bindings. All logical stores live in named databases of a single
//! environment, so a ledger commit and the mempool rows it marks committed
//! share one write transaction.

pub mod environment;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
