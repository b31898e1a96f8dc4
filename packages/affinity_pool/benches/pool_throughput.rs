//! End-to-end throughput of the pool variants on a prime-counting workload.
//!
//! Each iteration builds a pool, pushes the whole input through it with no
//! affinity and performs a graceful stop, so the measurement covers
//! submission, queue transfer and drain - the full life of a batch.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use affinity_pool::{Affinity, AffinityPool, LockFreeAffinityPool, MailboxPool, WaitPolicy};
use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;
use rand::Rng;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const INPUT_SIZE: usize = 10_000;
const WORKERS: usize = 4;

fn is_prime(candidate: u64) -> bool {
    if candidate < 2 {
        return false;
    }

    (2..=candidate.isqrt()).all(|divisor| candidate % divisor != 0)
}

fn count_if_prime(candidate: u64, count: &AtomicU64) {
    if is_prime(candidate) {
        count.fetch_add(1, Ordering::Relaxed);
    }
}

fn entrypoint(c: &mut Criterion) {
    let mut rng = rand::rng();
    let inputs: Vec<u64> = (0..INPUT_SIZE).map(|_| rng.random_range(0..1_000_000)).collect();

    let mut group = c.benchmark_group("pool_throughput");

    group.bench_function("single_thread", |b| {
        b.iter(|| {
            let count = AtomicU64::new(0);

            for &candidate in &inputs {
                count_if_prime(black_box(candidate), &count);
            }

            black_box(count.into_inner())
        });
    });

    group.bench_function("affinity_pool", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicU64::new(0));

            let pool = AffinityPool::builder().worker_count(nz!(WORKERS)).build({
                let count = Arc::clone(&count);
                move |candidate: u64| count_if_prime(candidate, &count)
            });

            for &candidate in &inputs {
                pool.submit(black_box(candidate), Affinity::Any);
            }

            pool.stop(true);
            black_box(count.load(Ordering::Relaxed))
        });
    });

    group.bench_function("lockfree_affinity_pool_spin", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicU64::new(0));

            let pool = LockFreeAffinityPool::builder()
                .worker_count(nz!(WORKERS))
                .wait_policy(WaitPolicy::Spin)
                .build({
                    let count = Arc::clone(&count);
                    move |candidate: u64| count_if_prime(candidate, &count)
                });

            for &candidate in &inputs {
                pool.submit(black_box(candidate), Affinity::Any);
            }

            pool.stop(true);
            black_box(count.load(Ordering::Relaxed))
        });
    });

    group.bench_function("lockfree_affinity_pool_sleep", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicU64::new(0));

            let pool = LockFreeAffinityPool::builder()
                .worker_count(nz!(WORKERS))
                .wait_policy(WaitPolicy::Sleep(Duration::from_micros(10)))
                .build({
                    let count = Arc::clone(&count);
                    move |candidate: u64| count_if_prime(candidate, &count)
                });

            for &candidate in &inputs {
                pool.submit(black_box(candidate), Affinity::Any);
            }

            pool.stop(true);
            black_box(count.load(Ordering::Relaxed))
        });
    });

    group.bench_function("mailbox_pool", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicU64::new(0));

            let pool = MailboxPool::new(nz!(WORKERS), {
                let count = Arc::clone(&count);
                move |candidate: u64| count_if_prime(candidate, &count)
            });

            for &candidate in &inputs {
                pool.submit(black_box(candidate));
            }

            pool.stop(true);
            black_box(count.load(Ordering::Relaxed))
        });
    });

    group.finish();
}
