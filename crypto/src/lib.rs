//! Hashing primitives for the gateway.
//!
//! - **Blake2b-256** for transaction identifiers (hash of the raw payload)
//! - Accumulator chaining: `accumulator(n) = blake2b(accumulator(n-1) ‖ tx_hash(n))`

pub mod hash;

pub use hash::{blake2b_256, blake2b_256_multi, hash_transaction, next_accumulator};
