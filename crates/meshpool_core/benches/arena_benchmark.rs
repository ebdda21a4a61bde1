//! # Arena Benchmark
//!
//! Measures the free-list hot paths under a fragmented arena:
//! 1. First-fit allocation against a long free list
//! 2. Allocate/free churn at steady state
//! 3. Coalescing after a removal pass

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshpool_core::Arena;

/// Builds an arena with `blocks` used blocks where every other one is freed.
fn fragmented(blocks: u64, block_size: u64) -> (Arena, Vec<u64>) {
    let mut arena = Arena::new(blocks * block_size * 2);
    let offsets: Vec<u64> = (0..blocks)
        .map(|_| arena.allocate(block_size).expect("capacity sized for all blocks"))
        .collect();
    for &offset in offsets.iter().step_by(2) {
        arena.free(offset).expect("offset was just allocated");
    }
    let kept = offsets.into_iter().skip(1).step_by(2).collect();
    (arena, kept)
}

fn bench_first_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_first_fit");

    for blocks in [1_000u64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("fragmented", blocks), &blocks, |b, &blocks| {
            b.iter_batched(
                || fragmented(blocks, 256).0,
                // Larger than any hole: scans the whole free list.
                |mut arena| black_box(arena.allocate(512)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    c.bench_function("arena_alloc_free_churn", |b| {
        let mut arena = Arena::new(64 * 1024 * 1024);
        b.iter(|| {
            let offset = arena.allocate(black_box(4096)).expect("arena has room");
            arena.free(offset).expect("offset was just allocated");
        });
    });
}

fn bench_defrag(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_defrag");

    for blocks in [1_000u64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("reclaim_all", blocks), &blocks, |b, &blocks| {
            b.iter_batched(
                || {
                    let (mut arena, kept) = fragmented(blocks, 256);
                    for offset in kept {
                        arena.free(offset).expect("offset is in use");
                    }
                    arena
                },
                |mut arena| black_box(arena.defrag()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_first_fit, bench_churn, bench_defrag);
criterion_main!(benches);
