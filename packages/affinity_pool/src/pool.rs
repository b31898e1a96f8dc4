use std::fmt;
use std::mem;
use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::{
    Affinity, AffinityPoolBuilder, BoundedQueue, ERR_POISONED_LOCK, Handler, ShutdownFlag,
    ShutdownMode, TrySubmitError,
};

/// A fixed set of worker threads, each consuming from its own bounded
/// blocking queue of work items.
///
/// Callers either pin an item to one worker ([`Affinity::Worker`]) or let the
/// pool pick a queue with free capacity ([`Affinity::Any`]), scanning from a
/// rotating cursor so unaffiliated work spreads across workers over time.
/// Queues are strictly bounded: a blocking [`submit`][Self::submit] waits for
/// capacity, a [`try_submit`][Self::try_submit] reports the rejection.
///
/// Each queue pairs a mutex with "not empty"/"not full" conditions; workers
/// invoke the processing function with no lock held. Items on the same queue
/// are processed in submission order; no ordering holds across queues.
///
/// When every queue is full, a blocking no-affinity submission waits on the
/// single queue the rotation cursor designates, even if another queue frees
/// up sooner. That keeps the wait on one condition at the cost of perfect
/// fairness; callers that need strict placement control should submit with
/// explicit affinity.
///
/// # Shutdown
///
/// [`stop(true)`][Self::stop] refuses new work, lets the workers drain every
/// queue, and joins them. [`stop(false)`][Self::stop] discards queued items
/// without processing them and detaches the workers; invocations already
/// executing may still complete after it returns. Dropping a running pool is
/// equivalent to `stop(false)`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use affinity_pool::{Affinity, AffinityPool};
/// use new_zealand::nz;
///
/// let total = Arc::new(AtomicU64::new(0));
///
/// let pool = AffinityPool::builder()
///     .worker_count(nz!(2))
///     .build({
///         let total = Arc::clone(&total);
///         move |item: u64| {
///             total.fetch_add(item * 2, Ordering::Relaxed);
///         }
///     });
///
/// for item in 1..=100 {
///     pool.submit(item, Affinity::Any);
/// }
///
/// // Finish everything queued, then terminate the workers.
/// pool.stop(true);
///
/// assert_eq!(total.load(Ordering::Relaxed), 10_100);
/// ```
pub struct AffinityPool<T>
where
    T: Send + 'static,
{
    shared: Arc<PoolShared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: NonZero<usize>,
    queue_capacity: NonZero<usize>,
}

struct PoolShared<T> {
    queues: Vec<BoundedQueue<T>>,
    shutdown: Arc<ShutdownFlag>,
    cursor: AtomicUsize,
    handler: Handler<T>,
}

impl<T> AffinityPool<T>
where
    T: Send + 'static,
{
    /// Starts building a pool. See [`AffinityPoolBuilder`] for the available
    /// settings.
    pub fn builder() -> AffinityPoolBuilder<T> {
        AffinityPoolBuilder::new()
    }

    pub(crate) fn new_inner(
        worker_count: NonZero<usize>,
        queue_capacity: NonZero<usize>,
        handler: Handler<T>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownFlag::new());

        let queues = (0..worker_count.get())
            .map(|_| BoundedQueue::new(queue_capacity, Arc::clone(&shutdown)))
            .collect();

        let shared = Arc::new(PoolShared {
            queues,
            shutdown,
            cursor: AtomicUsize::new(0),
            handler,
        });

        let workers = (0..worker_count.get())
            .map(|index| {
                let shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("affinity-pool-{index}"))
                    .spawn(move || worker_entrypoint(&shared, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
            worker_count,
            queue_capacity,
        }
    }

    /// The number of worker threads, fixed for the pool's lifetime.
    #[must_use]
    pub fn worker_count(&self) -> NonZero<usize> {
        self.worker_count
    }

    /// The capacity of each worker's queue.
    #[must_use]
    pub fn queue_capacity(&self) -> NonZero<usize> {
        self.queue_capacity
    }

    /// Submits an item, waiting for queue capacity if necessary.
    ///
    /// With [`Affinity::Worker`] the call waits on that worker's queue alone.
    /// With [`Affinity::Any`] the call first scans every queue for free
    /// capacity, starting from the rotation cursor; only if all are full does
    /// it wait, on the single queue the cursor designated.
    ///
    /// Once the pool is stopping the call becomes a no-op: the item is
    /// dropped without being enqueued, whether the shutdown began before the
    /// call or while it was waiting. Callers that need to know must use
    /// [`try_submit`][Self::try_submit].
    ///
    /// # Panics
    ///
    /// Panics if the affinity names a worker index outside
    /// `[0, worker_count)`.
    pub fn submit(&self, item: T, affinity: Affinity) {
        match affinity {
            Affinity::Worker(index) => {
                if let Err(rejected) = self.queue_for(index).push(item) {
                    // Shutdown won the race; the submission becomes a no-op.
                    drop(rejected);
                }
            }
            Affinity::Any => self.submit_any(item),
        }
    }

    /// Submits an item only if a queue has free capacity right now.
    ///
    /// On success the item is guaranteed to become visible to exactly one
    /// worker. On failure the item is handed back inside the error.
    ///
    /// # Panics
    ///
    /// Panics if the affinity names a worker index outside
    /// `[0, worker_count)`.
    pub fn try_submit(&self, item: T, affinity: Affinity) -> Result<(), TrySubmitError<T>> {
        match affinity {
            Affinity::Worker(index) => self.queue_for(index).try_push(item),
            Affinity::Any => self.try_submit_any(item),
        }
    }

    /// Stops the pool; safe to call again afterwards (the repeat call is a
    /// no-op), but must not be called concurrently with itself.
    ///
    /// With `wait == true` the pool refuses new work, workers finish every
    /// item already queued, and the call returns once all of them have
    /// terminated.
    ///
    /// With `wait == false` queued items are discarded unprocessed, all
    /// blocked submitters and workers are woken, and the workers are
    /// detached; an invocation of the processing function that had already
    /// started may still be running when the call returns.
    ///
    /// # Panics
    ///
    /// `stop(true)` panics if a worker thread panicked, which can only
    /// happen if the processing function panicked.
    pub fn stop(&self, wait: bool) {
        let mode = if wait {
            ShutdownMode::Drain
        } else {
            ShutdownMode::Discard
        };

        if !self.shared.shutdown.begin(mode) {
            return;
        }

        for queue in &self.shared.queues {
            if !wait {
                queue.discard_all();
            }

            queue.wake_all();
        }

        let workers = mem::take(&mut *self.workers.lock().expect(ERR_POISONED_LOCK));

        if wait {
            for worker in workers {
                worker.join().expect("worker thread panicked");
            }
        }

        // Without waiting, dropping the handles detaches the workers; they
        // observe the flag and exit on their own.
    }

    fn submit_any(&self, item: T) {
        let start = self.next_rotation_start();

        let mut item = item;
        for offset in 0..self.shared.queues.len() {
            let index = self.wrapped_index(start, offset);

            match self.shared.queues[index].try_push(item) {
                Ok(()) => return,
                Err(rejected) => item = rejected.into_item(),
            }
        }

        // Every queue was full (or the pool is stopping): wait on the one
        // queue the cursor designated. Another queue may free up sooner; the
        // single wait condition is the accepted trade-off.
        if let Err(rejected) = self.shared.queues[start].push(item) {
            drop(rejected);
        }
    }

    fn try_submit_any(&self, item: T) -> Result<(), TrySubmitError<T>> {
        let start = self.next_rotation_start();

        let mut item = item;
        for offset in 0..self.shared.queues.len() {
            let index = self.wrapped_index(start, offset);

            match self.shared.queues[index].try_push(item) {
                Ok(()) => return Ok(()),
                // Stopped applies to the pool as a whole; scanning further
                // queues cannot succeed.
                Err(TrySubmitError::Stopped(rejected)) => {
                    return Err(TrySubmitError::Stopped(rejected));
                }
                Err(TrySubmitError::Full(rejected)) => item = rejected,
            }
        }

        Err(TrySubmitError::Full(item))
    }

    /// Advances the rotation cursor and returns the scan start position it
    /// designated for this submission.
    fn next_rotation_start(&self) -> usize {
        self.shared.cursor.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len()
    }

    fn wrapped_index(&self, start: usize, offset: usize) -> usize {
        start.wrapping_add(offset) % self.shared.queues.len()
    }

    fn queue_for(&self, index: usize) -> &BoundedQueue<T> {
        self.shared.queues.get(index).unwrap_or_else(|| {
            panic!(
                "affinity index {index} is out of bounds for a pool of {} workers",
                self.worker_count
            )
        })
    }
}

impl<T> fmt::Debug for AffinityPool<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityPool")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("stopping", &self.shared.shutdown.is_stopping())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for AffinityPool<T>
where
    T: Send + 'static,
{
    #[cfg_attr(test, mutants::skip)] // Impractical to test that teardown stops happening.
    fn drop(&mut self) {
        if thread::panicking() {
            // We are probably in a dirty state; shutting down now could mask
            // the original panic, so do nothing.
            return;
        }

        self.stop(false);
    }
}

fn worker_entrypoint<T>(shared: &PoolShared<T>, worker_index: usize)
where
    T: Send + 'static,
{
    let queue = shared
        .queues
        .get(worker_index)
        .expect("every worker is spawned with an index within the pool");

    // `None` is terminal: queue empty and shutdown underway. A draining
    // shutdown keeps this loop running until the backlog is gone.
    while let Some(item) = queue.pop() {
        (shared.handler)(item);
    }
}
