use thiserror::Error;

/// Errors returned by the non-blocking submission entry points.
///
/// Both variants hand the rejected item back to the caller, who decides
/// whether to retry, route it elsewhere or drop it.
///
/// # Examples
///
/// ```
/// use affinity_pool::{Affinity, AffinityPool, TrySubmitError};
/// use new_zealand::nz;
///
/// let pool = AffinityPool::builder()
///     .worker_count(nz!(2))
///     .build(|_item: u64| {});
///
/// pool.stop(true);
///
/// // The pool no longer accepts work; the item comes back.
/// match pool.try_submit(42, Affinity::Any) {
///     Err(TrySubmitError::Stopped(item)) => assert_eq!(item, 42),
///     other => panic!("expected a shutdown rejection, got {other:?}"),
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrySubmitError<T> {
    /// Every eligible queue was at capacity.
    #[error("every eligible worker queue is at capacity")]
    Full(T),

    /// The pool had already begun shutting down when the submission was
    /// attempted.
    #[error("the pool is shutting down and no longer accepts work")]
    Stopped(T),
}

impl<T> TrySubmitError<T> {
    /// Consumes the error, returning the rejected item.
    #[must_use]
    pub fn into_item(self) -> T {
        match self {
            Self::Full(item) | Self::Stopped(item) => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(TrySubmitError<usize>: Debug, Error, Send, Sync);

    #[test]
    fn into_item_returns_rejected_item() {
        assert_eq!(TrySubmitError::Full("payload").into_item(), "payload");
        assert_eq!(TrySubmitError::Stopped("payload").into_item(), "payload");
    }

    #[test]
    fn display_distinguishes_variants() {
        let full = TrySubmitError::Full(0_u8).to_string();
        let stopped = TrySubmitError::Stopped(0_u8).to_string();

        assert_ne!(full, stopped);
    }
}
