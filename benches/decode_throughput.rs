//! Benchmarks for the wire decoder
//!
//! Measures raw-deflate + JSON decoding for payload sizes the curve server
//! produces (tens of points) up to dense curves (tens of thousands of points),
//! plus the store publish step that follows every decode.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use crow::CurveStore;
use crow::decoder::decode;
use crow::test_utils::{diagonal_update, encoded, helix_update};
use std::hint::black_box;

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for points in [19usize, 1_000, 20_000] {
        let payload = encoded(&helix_update(1, points, 8.0));
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), &payload, |b, payload| {
            b.iter(|| black_box(decode(black_box(payload)).expect("fixture decodes")))
        });
    }

    group.finish();
}

fn bench_decode_rejects_corrupt(c: &mut Criterion) {
    let mut payload = encoded(&diagonal_update(1, 19));
    payload.truncate(payload.len() / 2);

    c.bench_function("decode_truncated", |b| {
        b.iter(|| black_box(decode(black_box(&payload)).is_err()))
    });
}

fn bench_store_publish(c: &mut Criterion) {
    let store = CurveStore::new();
    let update = helix_update(1, 1_000, 8.0);

    c.bench_function("store_set_1000_points", |b| {
        b.iter(|| black_box(store.set(black_box(update.clone()))))
    });

    c.bench_function("store_get", |b| b.iter(|| black_box(store.get())));
}

criterion_group!(benches, bench_decode, bench_decode_rejects_corrupt, bench_store_publish);
criterion_main!(benches);
