use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;
use std::thread;

use new_zealand::nz;

use crate::{AffinityPool, DEFAULT_QUEUE_CAPACITY};

/// Builder for creating an instance of [`AffinityPool`].
///
/// All settings are optional: the worker count defaults to the available
/// parallelism of the host and the per-worker queue capacity defaults to
/// [`DEFAULT_QUEUE_CAPACITY`]. The processing function is provided to
/// [`build`][Self::build], which spawns the workers.
///
/// # Examples
///
/// ```
/// use affinity_pool::AffinityPool;
/// use new_zealand::nz;
///
/// let pool = AffinityPool::builder()
///     .worker_count(nz!(4))
///     .queue_capacity(nz!(64))
///     .build(|item: u64| {
///         let _ = item;
///     });
///
/// assert_eq!(pool.worker_count(), nz!(4));
/// assert_eq!(pool.queue_capacity(), nz!(64));
/// pool.stop(true);
/// ```
#[derive(Debug)]
#[must_use]
pub struct AffinityPoolBuilder<T> {
    worker_count: Option<NonZero<usize>>,
    queue_capacity: NonZero<usize>,

    _item: PhantomData<fn(T)>,
}

impl<T> AffinityPoolBuilder<T>
where
    T: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            worker_count: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            _item: PhantomData,
        }
    }

    /// Sets the number of worker threads (and therefore queues).
    ///
    /// Defaults to the available parallelism of the host.
    pub fn worker_count(mut self, count: NonZero<usize>) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Sets the capacity of each worker's queue.
    ///
    /// Defaults to [`DEFAULT_QUEUE_CAPACITY`].
    pub fn queue_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Spawns the worker threads and returns the running pool.
    ///
    /// The processing function is invoked concurrently from every worker
    /// thread; synchronizing any state it closes over is the caller's
    /// responsibility. It must not panic - a panicking processing function
    /// terminates its worker thread.
    #[must_use]
    pub fn build<F>(self, handler: F) -> AffinityPool<T>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        AffinityPool::new_inner(
            self.resolved_worker_count(),
            self.queue_capacity,
            Arc::new(handler),
        )
    }

    fn resolved_worker_count(&self) -> NonZero<usize> {
        self.worker_count
            .unwrap_or_else(|| thread::available_parallelism().unwrap_or(nz!(1)))
    }
}
