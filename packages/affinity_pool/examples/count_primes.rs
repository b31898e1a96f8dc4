//! Counts primes in a batch of random numbers, the classic workload for
//! exercising a worker pool: cheap items, lots of them, one shared
//! accumulator owned by the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use affinity_pool::{Affinity, AffinityPool};
use new_zealand::nz;
use rand::Rng;

const INPUT_SIZE: usize = 100_000;

fn is_prime(candidate: u64) -> bool {
    if candidate < 2 {
        return false;
    }

    (2..=candidate.isqrt()).all(|divisor| candidate % divisor != 0)
}

fn main() {
    let worker_count = thread::available_parallelism().unwrap_or(nz!(1));

    let mut rng = rand::rng();
    let inputs: Vec<u64> = (0..INPUT_SIZE)
        .map(|_| rng.random_range(0..10_000_000))
        .collect();

    let primes = Arc::new(AtomicU64::new(0));

    let pool = AffinityPool::builder().worker_count(worker_count).build({
        let primes = Arc::clone(&primes);
        move |candidate: u64| {
            if is_prime(candidate) {
                primes.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    let start = Instant::now();

    // Most of the batch is unaffiliated; the pool spreads it across workers.
    for &candidate in &inputs {
        pool.submit(candidate, Affinity::Any);
    }

    // A caller that wants related items on one worker pins them instead.
    for candidate in [2, 3, 5, 7] {
        pool.submit(candidate, Affinity::Worker(0));
    }

    pool.stop(true);

    let elapsed = start.elapsed();

    println!(
        "{} of {} numbers are prime ({} workers, {elapsed:?}, {:.0} ns/item)",
        primes.load(Ordering::Relaxed),
        inputs.len() + 4,
        worker_count,
        elapsed.as_nanos() as f64 / (inputs.len() + 4) as f64,
    );
}
