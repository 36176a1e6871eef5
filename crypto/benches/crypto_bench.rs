use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gateway_types::AccumulatorHash;

fn hash_transaction_1kb_bench(c: &mut Criterion) {
    let payload = vec![0xCDu8; 1024];

    c.bench_function("hash_transaction_1KB", |b| {
        b.iter(|| gateway_crypto::hash_transaction(black_box(&payload)))
    });
}

fn accumulator_chain_bench(c: &mut Criterion) {
    let hashes: Vec<_> = (0..1000u32)
        .map(|i| gateway_crypto::hash_transaction(&i.to_le_bytes()))
        .collect();

    c.bench_function("accumulator_chain_1000", |b| {
        b.iter(|| {
            hashes
                .iter()
                .fold(AccumulatorHash::ZERO, |acc, tx| {
                    gateway_crypto::next_accumulator(&acc, black_box(tx))
                })
        })
    });
}

criterion_group!(benches, hash_transaction_1kb_bench, accumulator_chain_bench);
criterion_main!(benches);
