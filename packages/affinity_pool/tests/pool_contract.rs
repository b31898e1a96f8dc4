//! Cross-variant contract tests: backpressure, ordering, drain and discard
//! behavior must be identical whichever queue strategy backs the pool.

use std::num::NonZero;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use affinity_pool::{
    Affinity, AffinityPool, LockFreeAffinityPool, TrySubmitError, WaitPolicy,
};
use new_zealand::nz;

/// The shared surface of the two affinity pool variants.
trait PoolContract<T>: Sized
where
    T: Send + 'static,
{
    fn build<F>(workers: NonZero<usize>, capacity: NonZero<usize>, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static;

    fn submit(&self, item: T, affinity: Affinity);
    fn try_submit(&self, item: T, affinity: Affinity) -> Result<(), TrySubmitError<T>>;
    fn stop(&self, wait: bool);
}

impl<T> PoolContract<T> for AffinityPool<T>
where
    T: Send + 'static,
{
    fn build<F>(workers: NonZero<usize>, capacity: NonZero<usize>, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        AffinityPool::builder()
            .worker_count(workers)
            .queue_capacity(capacity)
            .build(handler)
    }

    fn submit(&self, item: T, affinity: Affinity) {
        AffinityPool::submit(self, item, affinity);
    }

    fn try_submit(&self, item: T, affinity: Affinity) -> Result<(), TrySubmitError<T>> {
        AffinityPool::try_submit(self, item, affinity)
    }

    fn stop(&self, wait: bool) {
        AffinityPool::stop(self, wait);
    }
}

impl<T> PoolContract<T> for LockFreeAffinityPool<T>
where
    T: Send + 'static,
{
    fn build<F>(workers: NonZero<usize>, capacity: NonZero<usize>, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        // A short sleep keeps the retry loops civil on small test machines;
        // the contract under test does not depend on the policy.
        LockFreeAffinityPool::builder()
            .worker_count(workers)
            .queue_capacity(capacity)
            .wait_policy(WaitPolicy::Sleep(Duration::from_micros(50)))
            .build(handler)
    }

    fn submit(&self, item: T, affinity: Affinity) {
        LockFreeAffinityPool::submit(self, item, affinity);
    }

    fn try_submit(&self, item: T, affinity: Affinity) -> Result<(), TrySubmitError<T>> {
        LockFreeAffinityPool::try_submit(self, item, affinity)
    }

    fn stop(&self, wait: bool) {
        LockFreeAffinityPool::stop(self, wait);
    }
}

/// Marker item that makes the test handler park its worker until released.
const HELD: u32 = u32::MAX;

/// Ten items pinned to one two-slot queue behind a slow handler: the later
/// submissions must block until slots free, and all ten must run in
/// submission order.
fn pinned_backpressure_processes_in_order<P: PoolContract<u32>>() {
    let (tx, rx) = mpsc::channel();

    let pool = P::build(nz!(4), nz!(2), move |item: u32| {
        thread::sleep(Duration::from_millis(10));
        tx.send(item).expect("test receiver lives until the pool stops");
    });

    let submitting = Instant::now();
    for item in 0..10 {
        pool.submit(item, Affinity::Worker(0));
    }
    let submit_elapsed = submitting.elapsed();

    pool.stop(true);

    let processed: Vec<u32> = rx.try_iter().collect();
    assert_eq!(processed, (0..10).collect::<Vec<u32>>());

    // At most one item is in flight and two are queued, so at least seven
    // items fully passed through the 10ms handler before the last submission
    // could return.
    assert!(
        submit_elapsed >= Duration::from_millis(40),
        "submissions returned too quickly for a two-slot queue: {submit_elapsed:?}"
    );
}

/// One hundred unaffiliated integers, doubled into a shared accumulator;
/// after a graceful stop the total is exact regardless of interleaving.
fn unaffiliated_work_is_all_processed<P: PoolContract<u64>>() {
    let total = Arc::new(AtomicU64::new(0));

    let pool = P::build(nz!(2), nz!(512), {
        let total = Arc::clone(&total);
        move |item: u64| {
            total.fetch_add(item * 2, Ordering::Relaxed);
        }
    });

    for item in 1..=100 {
        pool.submit(item, Affinity::Any);
    }

    pool.stop(true);

    assert_eq!(total.load(Ordering::Relaxed), 10_100);
}

/// With the consumer parked, a two-slot queue accepts exactly two
/// non-blocking submissions and rejects the third with the item attached.
fn try_submit_reports_exhausted_capacity<P: PoolContract<u32>>() {
    let parked = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));

    let pool = P::build(nz!(2), nz!(2), {
        let parked = Arc::clone(&parked);
        let release = Arc::clone(&release);
        move |item: u32| {
            if item == HELD {
                parked.store(true, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
            }
        }
    });

    pool.submit(HELD, Affinity::Worker(0));
    while !parked.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    // Worker 0 is busy and nothing drains its queue.
    assert!(pool.try_submit(1, Affinity::Worker(0)).is_ok());
    assert!(pool.try_submit(2, Affinity::Worker(0)).is_ok());
    assert!(matches!(
        pool.try_submit(3, Affinity::Worker(0)),
        Err(TrySubmitError::Full(3))
    ));

    release.store(true, Ordering::SeqCst);
    pool.stop(true);
}

/// Hard stop with five items queued behind a parked worker: none of the five
/// run, ever.
fn hard_stop_discards_queued_items<P: PoolContract<u32>>() {
    let parked = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let processed = Arc::new(AtomicUsize::new(0));

    let pool = P::build(nz!(1), nz!(8), {
        let parked = Arc::clone(&parked);
        let release = Arc::clone(&release);
        let processed = Arc::clone(&processed);
        move |item: u32| {
            if item == HELD {
                parked.store(true, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
            } else {
                processed.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    pool.submit(HELD, Affinity::Worker(0));
    while !parked.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    for item in 0..5 {
        pool.submit(item, Affinity::Any);
    }

    pool.stop(false);
    release.store(true, Ordering::SeqCst);

    assert_eq!(processed.load(Ordering::SeqCst), 0);
}

#[test]
fn blocking_pinned_backpressure_processes_in_order() {
    pinned_backpressure_processes_in_order::<AffinityPool<u32>>();
}

#[test]
fn lockfree_pinned_backpressure_processes_in_order() {
    pinned_backpressure_processes_in_order::<LockFreeAffinityPool<u32>>();
}

#[test]
fn blocking_unaffiliated_work_is_all_processed() {
    unaffiliated_work_is_all_processed::<AffinityPool<u64>>();
}

#[test]
fn lockfree_unaffiliated_work_is_all_processed() {
    unaffiliated_work_is_all_processed::<LockFreeAffinityPool<u64>>();
}

#[test]
fn blocking_try_submit_reports_exhausted_capacity() {
    try_submit_reports_exhausted_capacity::<AffinityPool<u32>>();
}

#[test]
fn lockfree_try_submit_reports_exhausted_capacity() {
    try_submit_reports_exhausted_capacity::<LockFreeAffinityPool<u32>>();
}

#[test]
fn blocking_hard_stop_discards_queued_items() {
    hard_stop_discards_queued_items::<AffinityPool<u32>>();
}

#[test]
fn lockfree_hard_stop_discards_queued_items() {
    hard_stop_discards_queued_items::<LockFreeAffinityPool<u32>>();
}
