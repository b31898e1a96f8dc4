use std::fmt;
use std::mem;
use std::num::NonZero;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::{
    BoundedQueue, DEFAULT_QUEUE_CAPACITY, ERR_POISONED_LOCK, Handler, ShutdownFlag, ShutdownMode,
};

/// The single-queue simplification of [`AffinityPool`][crate::AffinityPool]:
/// every worker consumes from one shared bounded mailbox, so there is no
/// affinity and no routing, only load balancing by whichever worker gets to
/// the mailbox first.
///
/// Items may be processed in any order relative to each other once more than
/// one worker is draining the mailbox. Use this when locality does not
/// matter and the per-worker queues of the affinity pools would only add
/// routing overhead.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use affinity_pool::MailboxPool;
/// use new_zealand::nz;
///
/// let total = Arc::new(AtomicU64::new(0));
///
/// let pool = MailboxPool::new(nz!(2), {
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
pub struct MailboxPool<T>
where
    T: Send + 'static,
{
    shared: Arc<MailboxShared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: NonZero<usize>,
}

struct MailboxShared<T> {
    mailbox: BoundedQueue<T>,
    shutdown: Arc<ShutdownFlag>,
    handler: Handler<T>,
}

impl<T> MailboxPool<T>
where
    T: Send + 'static,
{
    /// Spawns `worker_count` workers sharing one mailbox of
    /// [`DEFAULT_QUEUE_CAPACITY`] slots.
    pub fn new<F>(worker_count: NonZero<usize>, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new_inner(worker_count, DEFAULT_QUEUE_CAPACITY, Arc::new(handler))
    }

    pub(crate) fn new_inner(
        worker_count: NonZero<usize>,
        queue_capacity: NonZero<usize>,
        handler: Handler<T>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownFlag::new());

        let shared = Arc::new(MailboxShared {
            mailbox: BoundedQueue::new(queue_capacity, Arc::clone(&shutdown)),
            shutdown,
            handler,
        });

        let workers = (0..worker_count.get())
            .map(|index| {
                let shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("mailbox-pool-{index}"))
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

    /// Submits an item, waiting for mailbox capacity if necessary.
    ///
    /// Once the pool is stopping the call becomes a no-op: the item is
    /// dropped without being enqueued.
    pub fn submit(&self, item: T) {
        if let Err(rejected) = self.shared.mailbox.push(item) {
            // Shutdown won the race; the submission becomes a no-op.
            drop(rejected);
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
            self.shared.mailbox.discard_all();
        }

        self.shared.mailbox.wake_all();

        let workers = mem::take(&mut *self.workers.lock().expect(ERR_POISONED_LOCK));

        if wait {
            for worker in workers {
                worker.join().expect("worker thread panicked");
            }
        }
    }
}

impl<T> fmt::Debug for MailboxPool<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxPool")
            .field("worker_count", &self.worker_count)
            .field("queued", &self.shared.mailbox.len())
            .field("stopping", &self.shared.shutdown.is_stopping())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for MailboxPool<T>
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

fn worker_entrypoint<T>(shared: &MailboxShared<T>)
where
    T: Send + 'static,
{
    while let Some(item) = shared.mailbox.pop() {
        (shared.handler)(item);
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(MailboxPool<usize>: Debug, Send, Sync);

    #[test]
    fn processes_every_item_once() {
        let counter = Arc::new(AtomicUsize::new(0));

        let pool = MailboxPool::new(nz!(4), {
            let counter = Arc::clone(&counter);
            move |_item: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for item in 0..500 {
            pool.submit(item);
        }

        pool.stop(true);

        assert_eq!(counter.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn submit_after_stop_is_a_no_op() {
        let counter = Arc::new(AtomicUsize::new(0));

        let pool = MailboxPool::new(nz!(2), {
            let counter = Arc::clone(&counter);
            move |_item: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        pool.submit(1);
        pool.stop(true);

        pool.submit(2);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let pool = MailboxPool::new(nz!(2), |_item: usize| {});

        pool.stop(true);
        pool.stop(false);
    }

    #[test]
    fn hard_stop_discards_backlog() {
        let gate = Arc::new(AtomicUsize::new(0));
        let counter = Arc::new(AtomicUsize::new(0));

        // A single worker held inside the handler: everything submitted
        // after the first item stays queued until we let go.
        let pool = MailboxPool::new_inner(
            nz!(1),
            nz!(16),
            Arc::new({
                let gate = Arc::clone(&gate);
                let counter = Arc::clone(&counter);
                move |_item: usize| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    while gate.load(Ordering::SeqCst) == 0 {
                        thread::yield_now();
                    }
                }
            }),
        );

        pool.submit(0);
        while counter.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }

        for item in 1..=5 {
            pool.submit(item);
        }

        pool.stop(false);
        gate.store(1, Ordering::SeqCst);

        // Only the in-flight item ran; the five queued behind it were
        // discarded.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
