/// Selects which worker of a pool a submission is bound to.
///
/// [`Worker`][Affinity::Worker] pins the item to one specific worker's queue,
/// which callers use to keep related work on one thread (cache and resource
/// locality). [`Any`][Affinity::Any] lets the pool place the item on whichever
/// queue has free capacity, starting the scan from a rotating cursor so that
/// unaffiliated work spreads across workers over time.
///
/// # Examples
///
/// ```
/// use affinity_pool::{Affinity, AffinityPool};
/// use new_zealand::nz;
///
/// let pool = AffinityPool::builder()
///     .worker_count(nz!(2))
///     .build(|_item: u32| {});
///
/// // Pinned to worker 1.
/// pool.submit(1234, Affinity::Worker(1));
///
/// // Any worker may take this one.
/// pool.submit(5678, Affinity::Any);
///
/// pool.stop(true);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Affinity {
    /// Any worker may process the item; the pool picks the queue. This is
    /// the default.
    #[default]
    Any,

    /// The item must be processed by the worker with this index.
    ///
    /// The index must be in `[0, worker_count)`. Submitting with an
    /// out-of-range index is a contract violation and panics.
    Worker(usize),
}
