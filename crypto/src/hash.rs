//! Blake2b hashing for transactions and the ledger accumulator.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use gateway_types::{AccumulatorHash, TxHash};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash a raw transaction payload to produce its `TxHash`.
pub fn hash_transaction(payload: &[u8]) -> TxHash {
    TxHash::new(blake2b_256(payload))
}

/// Chain a committed transaction onto its parent's accumulator.
pub fn next_accumulator(parent: &AccumulatorHash, transaction: &TxHash) -> AccumulatorHash {
    AccumulatorHash::new(blake2b_256_multi(&[
        parent.as_bytes(),
        transaction.as_bytes(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        assert_eq!(blake2b_256(b"ledger"), blake2b_256(b"ledger"));
    }

    #[test]
    fn blake2b_multi_equivalent() {
        let single = blake2b_256(b"helloworld");
        let multi = blake2b_256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn hash_transaction_is_nonzero() {
        assert!(!hash_transaction(b"").is_zero());
    }

    #[test]
    fn accumulator_depends_on_parent_and_order() {
        let a = hash_transaction(b"a");
        let b = hash_transaction(b"b");
        let root = AccumulatorHash::ZERO;

        let ab = next_accumulator(&next_accumulator(&root, &a), &b);
        let ba = next_accumulator(&next_accumulator(&root, &b), &a);
        assert_ne!(ab, ba);

        let other_root = AccumulatorHash::new([7; 32]);
        assert_ne!(next_accumulator(&root, &a), next_accumulator(&other_root, &a));
    }
}
