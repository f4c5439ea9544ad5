//! Benchmarks for the pure parts of queue reconstruction.
//!
//! - Folding collected signatures and joining them with resolved records
//! - Authorization blob encoding
//! - safeTxHash derivation
//!
//! Run with: cargo bench

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ethers::types::{Address, Bytes, H256, U256};
use safe_queue::runtime::QueueAccumulator;
use safe_queue::{
    encode_authorization, transaction_identity, AccountIdentity, Signature, TransactionParams, TransactionRecord,
};

fn signature(signer: u64, identity: H256) -> Signature {
    Signature {
        r: H256::from_low_u64_be(signer.wrapping_mul(31)),
        vs: H256::from_low_u64_be(signer.wrapping_mul(17)),
        identity,
        claimed_signer: Address::from_low_u64_be(signer + 1),
    }
}

/// `owners` signers each signing `per_nonce` competing proposals at every
/// nonce in the window.
fn workload(owners: u64, window: u64, per_nonce: u64) -> (Vec<(u64, Vec<Signature>)>, HashMap<H256, TransactionRecord>) {
    let mut buckets = Vec::new();
    let mut records = HashMap::new();
    for nonce in 0..window {
        let identities: Vec<H256> = (0..per_nonce).map(|i| H256::from_low_u64_be(nonce * 1_000 + i + 1)).collect();
        for &identity in &identities {
            let mut record = TransactionRecord::unstored(identity);
            record.stored = true;
            record.params.nonce = nonce;
            records.insert(identity, record);
        }
        for owner in 0..owners {
            buckets.push((nonce, identities.iter().map(|&id| signature(owner, id)).collect()));
        }
    }
    (buckets, records)
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for (owners, window, per_nonce) in [(3, 10, 1), (10, 10, 3), (20, 50, 5)] {
        let (buckets, records) = workload(owners, window, per_nonce);
        group.throughput(Throughput::Elements(owners * window * per_nonce));
        group.bench_with_input(
            BenchmarkId::new("owners_window_proposals", format!("{}_{}_{}", owners, window, per_nonce)),
            &(buckets, records),
            |b, (buckets, records)| {
                b.iter(|| {
                    let mut accumulator = QueueAccumulator::new();
                    for (nonce, signatures) in buckets {
                        accumulator.fold(*nonce, signatures.iter().copied());
                    }
                    black_box(accumulator.finish(records))
                });
            },
        );
    }

    group.finish();
}

fn bench_authorization(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_authorization");
    let identity = H256::repeat_byte(0x42);

    for n in [2u64, 5, 15, 50] {
        // Reverse order so every run pays for the sort.
        let signatures: Vec<Signature> = (0..n).rev().map(|i| signature(i, identity)).collect();
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &signatures, |b, signatures| {
            b.iter(|| black_box(encode_authorization(signatures)))
        });
    }

    group.finish();
}

fn bench_identity(c: &mut Criterion) {
    let account = AccountIdentity::new(Address::repeat_byte(0xAA), 1);
    let params = TransactionParams::call(
        Address::repeat_byte(0x77),
        U256::exp10(18),
        Bytes::from(vec![0xab; 256]),
        7,
    );

    c.bench_function("transaction_identity", |b| {
        b.iter(|| black_box(transaction_identity(black_box(&account), black_box(&params))))
    });
}

criterion_group!(benches, bench_assembly, bench_authorization, bench_identity);
criterion_main!(benches);
