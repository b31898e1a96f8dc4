use std::sync::Arc;

/// The processing function shared by every worker of one pool.
///
/// Stored once at pool construction and never reassigned. It is invoked
/// concurrently from all worker threads, with no pool lock held.
pub(crate) type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;
