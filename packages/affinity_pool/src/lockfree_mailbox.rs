use std::fmt;
use std::mem;
use std::num::NonZero;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_queue::ArrayQueue;

use crate::{
    DEFAULT_QUEUE_CAPACITY, ERR_POISONED_LOCK, Handler, ShutdownFlag, ShutdownMode, WaitPolicy,
};

/// The lock-free single-queue simplification: every worker polls one shared
/// fixed-capacity lock-free mailbox, stalling between attempts according to
/// the configured [`WaitPolicy`].
///
/// Unlike every other pool in this crate, a full mailbox does not make
/// [`submit`][Self::submit] wait: the item is processed on the submitting
/// thread instead (caller-runs overflow). Submission therefore never blocks,
/// at the price of the caller occasionally doing worker duty - and of items
/// processed that way jumping ahead of the queued backlog.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use affinity_pool::{LockFreeMailboxPool, WaitPolicy};
/// use new_zealand::nz;
///
/// let total = Arc::new(AtomicU64::new(0));
///
/// let pool = LockFreeMailboxPool::new(nz!(2), WaitPolicy::from_micros(20), {
///     let total = Arc::clone(&total);
///     move |item: u64| {
///         total.fetch_add(item, Ordering::Relaxed);
///     }
/// });
///
/// for item in 1..=10 {
///     pool.submit(item);
/// }
///
/// pool.stop(true);
///
/// assert_eq!(total.load(Ordering::Relaxed), 55);
/// ```
pub struct LockFreeMailboxPool<T>
where
    T: Send + 'static,
{
    shared: Arc<LockFreeMailboxShared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: NonZero<usize>,
}

struct LockFreeMailboxShared<T> {
    mailbox: ArrayQueue<T>,
    shutdown: ShutdownFlag,
    handler: Handler<T>,
    wait_policy: WaitPolicy,
}

impl<T> LockFreeMailboxPool<T>
where
    T: Send + 'static,
{
    /// Spawns `worker_count` workers sharing one mailbox of
    /// [`DEFAULT_QUEUE_CAPACITY`] slots.
    pub fn new<F>(worker_count: NonZero<usize>, wait_policy: WaitPolicy, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new_inner(
            worker_count,
            DEFAULT_QUEUE_CAPACITY,
            wait_policy,
            Arc::new(handler),
        )
    }

    pub(crate) fn new_inner(
        worker_count: NonZero<usize>,
        queue_capacity: NonZero<usize>,
        wait_policy: WaitPolicy,
        handler: Handler<T>,
    ) -> Self {
        let shared = Arc::new(LockFreeMailboxShared {
            mailbox: ArrayQueue::new(queue_capacity.get()),
            shutdown: ShutdownFlag::new(),
            handler,
            wait_policy,
        });

        let workers = (0..worker_count.get())
            .map(|index| {
                let shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("lockfree-mailbox-pool-{index}"))
                    .spawn(move || worker_entrypoint(&shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    /// The number of worker threads, fixed for the pool's lifetime.
    #[must_use]
    pub fn worker_count(&self) -> NonZero<usize> {
        self.worker_count
    }

    /// Submits an item without ever waiting: a full mailbox makes this call
    /// process the item on the current thread instead.
    ///
    /// Once the pool is stopping the call becomes a no-op: the item is
    /// dropped without being enqueued or processed.
    pub fn submit(&self, item: T) {
        if self.shared.shutdown.is_stopping() {
            return;
        }

        if let Err(overflow) = self.shared.mailbox.push(item) {
            // Caller-runs overflow: the mailbox is full, so do the work here
            // rather than wait for a slot.
            (self.shared.handler)(overflow);
        }
    }

    /// Stops the pool; safe to call again afterwards (the repeat call is a
    /// no-op), but must not be called concurrently with itself.
    ///
    /// With `wait == true` the workers finish the queued backlog and are
    /// joined; with `wait == false` the backlog is discarded and the workers
    /// are detached.
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
            while self.shared.mailbox.pop().is_some() {}
        }

        let workers = mem::take(&mut *self.workers.lock().expect(ERR_POISONED_LOCK));

        if wait {
            for worker in workers {
                worker.join().expect("worker thread panicked");
            }
        }
    }
}

impl<T> fmt::Debug for LockFreeMailboxPool<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeMailboxPool")
            .field("worker_count", &self.worker_count)
            .field("queued", &self.shared.mailbox.len())
            .field("stopping", &self.shared.shutdown.is_stopping())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockFreeMailboxPool<T>
where
    T: Send + 'static,
{
    #[cfg_attr(test, mutants::skip)] // Impractical to test that teardown stops happening.
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }

        self.stop(false);
    }
}

fn worker_entrypoint<T>(shared: &LockFreeMailboxShared<T>)
where
    T: Send + 'static,
{
    loop {
        if shared.shutdown.is_discarding() {
            return;
        }

        match shared.mailbox.pop() {
            Some(item) => (shared.handler)(item),
            None => {
                if shared.shutdown.is_stopping() {
                    return;
                }

                shared.wait_policy.idle();
            }
        }
    }
}
