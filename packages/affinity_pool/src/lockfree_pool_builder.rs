use std::marker::PhantomData;
use std::num::NonZero;
use std::sync::Arc;
use std::thread;

use new_zealand::nz;

use crate::{DEFAULT_QUEUE_CAPACITY, LockFreeAffinityPool, WaitPolicy};

/// Builder for creating an instance of [`LockFreeAffinityPool`].
///
/// All settings are optional: the worker count defaults to the available
/// parallelism of the host, the per-worker queue capacity defaults to
/// [`DEFAULT_QUEUE_CAPACITY`] and the wait policy defaults to
/// [`WaitPolicy::Spin`]. The processing function is provided to
/// [`build`][Self::build], which spawns the workers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use affinity_pool::{LockFreeAffinityPool, WaitPolicy};
/// use new_zealand::nz;
///
/// let pool = LockFreeAffinityPool::builder()
///     .worker_count(nz!(2))
///     .wait_policy(WaitPolicy::Sleep(Duration::from_micros(50)))
///     .build(|item: u64| {
///         let _ = item;
///     });
///
/// assert_eq!(pool.worker_count(), nz!(2));
/// pool.stop(true);
/// ```
#[derive(Debug)]
#[must_use]
pub struct LockFreeAffinityPoolBuilder<T> {
    worker_count: Option<NonZero<usize>>,
    queue_capacity: NonZero<usize>,
    wait_policy: WaitPolicy,

    _item: PhantomData<fn(T)>,
}

impl<T> LockFreeAffinityPoolBuilder<T>
where
    T: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            worker_count: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wait_policy: WaitPolicy::default(),
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

    /// Sets the backoff applied between retries whenever a queue is found
    /// empty (by a worker) or full (by a blocking submitter).
    ///
    /// Defaults to [`WaitPolicy::Spin`].
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Spawns the worker threads and returns the running pool.
    ///
    /// The processing function is invoked concurrently from every worker
    /// thread; synchronizing any state it closes over is the caller's
    /// responsibility. It must not panic - a panicking processing function
    /// terminates its worker thread.
    #[must_use]
    pub fn build<F>(self, handler: F) -> LockFreeAffinityPool<T>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        LockFreeAffinityPool::new_inner(
            self.resolved_worker_count(),
            self.queue_capacity,
            self.wait_policy,
            Arc::new(handler),
        )
    }

    fn resolved_worker_count(&self) -> NonZero<usize> {
        self.worker_count
            .unwrap_or_else(|| thread::available_parallelism().unwrap_or(nz!(1)))
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::time::Duration;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(LockFreeAffinityPoolBuilder<usize>: Debug, Send);

    #[test]
    fn defaults_apply() {
        let builder = LockFreeAffinityPoolBuilder::<usize>::new();

        assert!(builder.worker_count.is_none());
        assert_eq!(builder.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(builder.wait_policy, WaitPolicy::Spin);
    }

    #[test]
    fn settings_override_defaults() {
        let builder = LockFreeAffinityPoolBuilder::<usize>::new()
            .worker_count(nz!(5))
            .queue_capacity(nz!(32))
            .wait_policy(WaitPolicy::Sleep(Duration::from_micros(10)));

        assert_eq!(builder.worker_count, Some(nz!(5)));
        assert_eq!(builder.queue_capacity, nz!(32));
        assert_eq!(
            builder.wait_policy,
            WaitPolicy::Sleep(Duration::from_micros(10))
        );
    }

    #[test]
    fn build_applies_settings() {
        let pool = LockFreeAffinityPool::builder()
            .worker_count(nz!(2))
            .queue_capacity(nz!(8))
            .build(|_item: usize| {});

        assert_eq!(pool.worker_count(), nz!(2));
        assert_eq!(pool.queue_capacity(), nz!(8));

        pool.stop(true);
    }
}
