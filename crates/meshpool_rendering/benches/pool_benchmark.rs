//! # Geometry Pool Benchmark
//!
//! Producer-side costs against the recording backend:
//! 1. `queue_geometry` + `remove` on the frame thread
//! 2. A full upload flush round trip through the worker
//! 3. A removal pass over a batch of deleted geometries

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshpool_rendering::{Geometry, GeometryPool, PoolConfig, RecordingBuffers};
use std::sync::Arc;
use std::time::{Duration, Instant};

const VERTEX_FLOATS: usize = 14 * 64;
const INDEX_COUNT: usize = 96;

fn bench_pool() -> GeometryPool {
    let config = PoolConfig::for_grid(8);
    let pool = GeometryPool::new(RecordingBuffers::new(), config).expect("bench config is valid");

    let mut placeholder = Geometry::new();
    pool.queue_geometry(&mut placeholder, Arc::from(vec![0.0f32; 14]), Arc::from(vec![0u32; 3]))
        .expect("empty pool has room");
    pool.set_placeholder(&placeholder).expect("first placeholder");
    pool
}

fn payload() -> (Arc<[f32]>, Arc<[u32]>) {
    (
        Arc::from(vec![1.0f32; VERTEX_FLOATS]),
        Arc::from((0..INDEX_COUNT as u32).collect::<Vec<_>>()),
    )
}

fn bench_queue_remove(c: &mut Criterion) {
    let pool = bench_pool();
    let (vertices, indices) = payload();
    let mut since_pass = 0u32;

    c.bench_function("pool_queue_then_remove", |b| {
        b.iter(|| {
            let mut geometry = Geometry::new();
            pool.queue_geometry(&mut geometry, Arc::clone(&vertices), Arc::clone(&indices))
                .expect("removal passes keep the pool from filling");
            pool.remove(black_box(&mut geometry)).expect("placeholder is set");

            since_pass += 1;
            if since_pass == 256 {
                since_pass = 0;
                pool.mark_upload_pending();
                pool.request_removal_pass().expect("pool is healthy");
            }
        });
    });
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_upload_flush");

    for batch in [16usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let pool = bench_pool();
            let (vertices, indices) = payload();

            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let mut geometries = vec![Geometry::new(); batch];
                    for geometry in &mut geometries {
                        pool.queue_geometry(geometry, Arc::clone(&vertices), Arc::clone(&indices))
                            .expect("batch fits the pool");
                    }

                    let start = Instant::now();
                    pool.mark_upload_pending();
                    pool.wait_for_upload_completion().expect("pool is healthy");
                    total += start.elapsed();

                    for geometry in &mut geometries {
                        pool.remove(geometry).expect("placeholder is set");
                    }
                    pool.request_removal_pass().expect("pool is healthy");
                    pool.wait_for_removal_pass().expect("pool is healthy");
                }
                total
            });
        });
    }

    group.finish();
}

fn bench_removal_pass(c: &mut Criterion) {
    let pool = bench_pool();
    let (vertices, indices) = payload();

    c.bench_function("pool_removal_pass_256", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let mut geometries = vec![Geometry::new(); 256];
                for geometry in &mut geometries {
                    pool.queue_geometry(geometry, Arc::clone(&vertices), Arc::clone(&indices))
                        .expect("batch fits the pool");
                }
                // Every other one, so the pass has holes to coalesce.
                for geometry in geometries.iter_mut().step_by(2) {
                    pool.remove(geometry).expect("placeholder is set");
                }

                let start = Instant::now();
                pool.request_removal_pass().expect("pool is healthy");
                pool.wait_for_removal_pass().expect("pool is healthy");
                total += start.elapsed();

                for geometry in geometries.iter_mut().skip(1).step_by(2) {
                    pool.remove(geometry).expect("placeholder is set");
                }
                pool.request_removal_pass().expect("pool is healthy");
                pool.wait_for_removal_pass().expect("pool is healthy");
            }
            total
        });
    });
}

criterion_group!(benches, bench_queue_remove, bench_flush, bench_removal_pass);
criterion_main!(benches);
