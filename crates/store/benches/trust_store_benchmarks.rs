#![allow(clippy::expect_used)]

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rollcert_store::{
    CertificateRecord, TrustSnapshot, TrustStore,
    testutil::{issuer_record, verifier_record},
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One signer plus `count - 1` verification-only certificates.
fn records(count: usize) -> Vec<CertificateRecord> {
    let mut records = Vec::with_capacity(count);
    records.push(issuer_record("signer"));
    records.extend((1..count).map(|i| verifier_record(&format!("verifier-{i:05}"))));
    records
}

fn populated_store(count: usize) -> (TrustStore, Vec<CertificateRecord>) {
    let records = records(count);
    let store = TrustStore::new(TrustSnapshot::from_records(records.clone(), Utc::now()));
    (store, records)
}

// ---------------------------------------------------------------------------
// 1. lookup_operations
// ---------------------------------------------------------------------------

fn lookup_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_operations");

    for &count in &[1, 16, 1024] {
        let (store, records) = populated_store(count);
        let thumbprint = records[count - 1].thumbprint().to_string();
        group.bench_with_input(BenchmarkId::new("trusted", count), &count, |b, _| {
            b.iter(|| {
                assert!(store.lookup(&thumbprint).is_some());
            });
        });
    }

    // -- unknown thumbprint --
    {
        let (store, _) = populated_store(16);
        let unknown = "ab".repeat(32);
        group.bench_function("unknown", |b| {
            b.iter(|| {
                assert!(store.lookup(&unknown).is_none());
            });
        });
    }

    // -- uppercase input is normalized --
    {
        let (store, records) = populated_store(16);
        let upper = records[0].thumbprint().to_string().to_uppercase();
        group.bench_function("uppercase", |b| {
            b.iter(|| {
                assert!(store.lookup(&upper).is_some());
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. rotate_operations
// ---------------------------------------------------------------------------

fn rotate_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotate_operations");

    for &count in &[1, 16, 1024] {
        let (store, records) = populated_store(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("build_and_publish", count), &count, |b, _| {
            b.iter(|| {
                store.rotate(TrustSnapshot::from_records(records.clone(), Utc::now()));
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. snapshot_operations
// ---------------------------------------------------------------------------

fn snapshot_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_operations");

    let (store, _) = populated_store(16);
    group.bench_function("load", |b| {
        b.iter(|| {
            let snapshot = store.snapshot();
            assert!(snapshot.current_issuer().is_some());
        });
    });

    let (store, _) = populated_store(1024);
    group.bench_function("summaries_1024", |b| {
        b.iter(|| {
            assert_eq!(store.summaries().len(), 1024);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group registration
// ---------------------------------------------------------------------------

criterion_group!(benches, lookup_operations, rotate_operations, snapshot_operations);
criterion_main!(benches);
