// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Segment pool and header codec benchmarks.
//
// Run with:
//   cargo bench --bench pool_throughput
//
// Groups:
//   pool_acquire_restore — allocate-then-restore round trip at three
//                          payload sizes, the hot path for every
//                          SM_OVER_PIPE send/recv pair.
//   header_codec         — encode/decode of the fixed 8-byte frame header.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use smipc::header::Header;
use smipc::pool::SegmentPool;

const SMALL: usize = 64;
const MEDIUM: usize = 4096;
const LARGE: usize = 1 << 20;

const SIZES: &[(&str, usize)] = &[
    ("small_64", SMALL),
    ("medium_4096", MEDIUM),
    ("large_1mb", LARGE),
];

fn bench_pool_acquire_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_acquire_restore");

    for &(label, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &sz| {
            let mut pool = SegmentPool::new(format!("/smipc-bench-{label}"), -1);
            b.iter(|| {
                let name = {
                    let seg = pool.acquire(sz).unwrap();
                    seg.write(&vec![0xABu8; sz]);
                    seg.name().to_string()
                };
                black_box(&name);
                pool.restore(&name).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_header_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_codec");

    group.bench_function("encode", |b| {
        let header = Header::sm_over_pipe(32, 4096);
        b.iter(|| black_box(header.encode()));
    });

    group.bench_function("decode", |b| {
        let buf = Header::sm_over_pipe(32, 4096).encode();
        b.iter(|| black_box(Header::decode(&buf).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_pool_acquire_restore, bench_header_codec);
criterion_main!(benches);
