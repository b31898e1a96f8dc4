use std::fmt;
use std::mem;
use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_queue::ArrayQueue;
use crossbeam_utils::CachePadded;

use crate::{
    Affinity, ERR_POISONED_LOCK, Handler, LockFreeAffinityPoolBuilder, ShutdownFlag, ShutdownMode,
    TrySubmitError, WaitPolicy,
};

/// The lock-free sibling of [`AffinityPool`][crate::AffinityPool]: the same
/// affinity and shutdown contract, with each worker's queue backed by a
/// fixed-capacity lock-free FIFO instead of a mutex and conditions.
///
/// Nothing here ever truly blocks. Where the blocking pool would wait on a
/// condition, workers and submitters retry in a loop, stalling between
/// attempts according to the configured [`WaitPolicy`]: busy-spinning trades
/// CPU for reaction latency, a sleep interval trades up to one interval of
/// latency for an idle CPU. Avoiding the mutex also removes its worst-case
/// wakeup latency and priority-inversion behavior.
///
/// Each queue sits in its own cache-line-padded slot so that per-worker
/// producer/consumer traffic does not false-share with its neighbors.
///
/// # Shutdown
///
/// Same contract as the blocking pool: `stop(true)` drains, `stop(false)`
/// discards, dropping a running pool is `stop(false)`. One caveat is
/// inherent to the lock-free design and carried over deliberately: the stop
/// flag and a queue push cannot be made atomic as one step without a lock,
/// so a submission racing with `stop` can slip an item into a queue that no
/// worker will visit again. The blocking variant closes this window with the
/// queue lock; this one documents it instead. Callers that need a hard
/// guarantee should stop submitting before stopping the pool.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::time::Duration;
///
/// use affinity_pool::{Affinity, LockFreeAffinityPool, WaitPolicy};
/// use new_zealand::nz;
///
/// let total = Arc::new(AtomicU64::new(0));
///
/// let pool = LockFreeAffinityPool::builder()
///     .worker_count(nz!(2))
///     .wait_policy(WaitPolicy::Sleep(Duration::from_micros(20)))
///     .build({
///         let total = Arc::clone(&total);
///         move |item: u64| {
///             total.fetch_add(item, Ordering::Relaxed);
///         }
///     });
///
/// for item in 1..=100 {
///     pool.submit(item, Affinity::Any);
/// }
///
/// pool.stop(true);
///
/// assert_eq!(total.load(Ordering::Relaxed), 5050);
/// ```
pub struct LockFreeAffinityPool<T>
where
    T: Send + 'static,
{
    shared: Arc<LockFreeShared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: NonZero<usize>,
    queue_capacity: NonZero<usize>,
}

struct LockFreeShared<T> {
    queues: Vec<CachePadded<ArrayQueue<T>>>,
    shutdown: ShutdownFlag,
    cursor: AtomicUsize,
    handler: Handler<T>,
    wait_policy: WaitPolicy,
}

impl<T> LockFreeAffinityPool<T>
where
    T: Send + 'static,
{
    /// Starts building a pool. See [`LockFreeAffinityPoolBuilder`] for the
    /// available settings.
    pub fn builder() -> LockFreeAffinityPoolBuilder<T> {
        LockFreeAffinityPoolBuilder::new()
    }

    pub(crate) fn new_inner(
        worker_count: NonZero<usize>,
        queue_capacity: NonZero<usize>,
        wait_policy: WaitPolicy,
        handler: Handler<T>,
    ) -> Self {
        let queues = (0..worker_count.get())
            .map(|_| CachePadded::new(ArrayQueue::new(queue_capacity.get())))
            .collect();

        let shared = Arc::new(LockFreeShared {
            queues,
            shutdown: ShutdownFlag::new(),
            cursor: AtomicUsize::new(0),
            handler,
            wait_policy,
        });

        let workers = (0..worker_count.get())
            .map(|index| {
                let shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("lockfree-affinity-pool-{index}"))
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

    /// The backoff applied between retries of a full or empty queue.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        self.shared.wait_policy
    }

    /// Submits an item, retrying (with backoff) until a queue accepts it.
    ///
    /// With [`Affinity::Worker`] every retry targets that worker's queue
    /// alone. With [`Affinity::Any`] each round re-scans all queues from the
    /// position the rotation cursor designated for this submission.
    ///
    /// Once the pool is stopping the call becomes a no-op: the item is
    /// dropped without being enqueued, whether the shutdown began before the
    /// call or between retries.
    ///
    /// # Panics
    ///
    /// Panics if the affinity names a worker index outside
    /// `[0, worker_count)`.
    pub fn submit(&self, item: T, affinity: Affinity) {
        match affinity {
            Affinity::Worker(index) => {
                self.assert_worker_index(index);

                let mut item = item;
                loop {
                    if self.shared.shutdown.is_stopping() {
                        // Shutdown won the race; the submission becomes a no-op.
                        drop(item);
                        return;
                    }

                    match self.shared.queues[index].push(item) {
                        Ok(()) => return,
                        Err(rejected) => item = rejected,
                    }

                    self.shared.wait_policy.idle();
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
        if self.shared.shutdown.is_stopping() {
            return Err(TrySubmitError::Stopped(item));
        }

        match affinity {
            Affinity::Worker(index) => {
                self.assert_worker_index(index);

                self.shared.queues[index]
                    .push(item)
                    .map_err(TrySubmitError::Full)
            }
            Affinity::Any => {
                let start = self.next_rotation_start();

                let mut item = item;
                for offset in 0..self.shared.queues.len() {
                    let index = self.wrapped_index(start, offset);

                    match self.shared.queues[index].push(item) {
                        Ok(()) => return Ok(()),
                        Err(rejected) => item = rejected,
                    }
                }

                Err(TrySubmitError::Full(item))
            }
        }
    }

    /// Stops the pool; safe to call again afterwards (the repeat call is a
    /// no-op), but must not be called concurrently with itself.
    ///
    /// With `wait == true` the pool refuses new work, workers finish every
    /// item already queued, and the call returns once all of them have
    /// terminated.
    ///
    /// With `wait == false` queued items are discarded unprocessed and the
    /// workers are detached; an invocation of the processing function that
    /// had already started may still be running when the call returns.
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

        if !wait {
            for queue in &self.shared.queues {
                while queue.pop().is_some() {}
            }
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
        loop {
            if self.shared.shutdown.is_stopping() {
                drop(item);
                return;
            }

            for offset in 0..self.shared.queues.len() {
                let index = self.wrapped_index(start, offset);

                match self.shared.queues[index].push(item) {
                    Ok(()) => return,
                    Err(rejected) => item = rejected,
                }
            }

            self.shared.wait_policy.idle();
        }
    }

    /// Advances the rotation cursor and returns the scan start position it
    /// designated for this submission.
    fn next_rotation_start(&self) -> usize {
        self.shared.cursor.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len()
    }

    fn wrapped_index(&self, start: usize, offset: usize) -> usize {
        start.wrapping_add(offset) % self.shared.queues.len()
    }

    fn assert_worker_index(&self, index: usize) {
        assert!(
            index < self.worker_count.get(),
            "affinity index {index} is out of bounds for a pool of {} workers",
            self.worker_count
        );
    }
}

impl<T> fmt::Debug for LockFreeAffinityPool<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeAffinityPool")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("wait_policy", &self.shared.wait_policy)
            .field("stopping", &self.shared.shutdown.is_stopping())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockFreeAffinityPool<T>
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

fn worker_entrypoint<T>(shared: &LockFreeShared<T>, worker_index: usize)
where
    T: Send + 'static,
{
    let queue = shared
        .queues
        .get(worker_index)
        .expect("every worker is spawned with an index within the pool");

    loop {
        // A discarding stop abandons queued items; do not pick up another
        // one even if the sweep in `stop` has not reached this queue yet.
        if shared.shutdown.is_discarding() {
            return;
        }

        match queue.pop() {
            Some(item) => (shared.handler)(item),
            None => {
                // Empty and stopping is the sole exit condition of the
                // draining path.
                if shared.shutdown.is_stopping() {
                    return;
                }

                shared.wait_policy.idle();
            }
        }
    }
}
