//! Bounded, multi-queue worker pools with per-worker affinity routing.
//!
//! A fixed set of worker threads each consume from their own bounded queue of
//! work items and run one shared processing function on them. Callers submit
//! items either to a specific worker ([`Affinity::Worker`]) to control cache
//! and resource locality, or with no affinity ([`Affinity::Any`]) to have the
//! pool pick a queue with free capacity, scanning from a rotating cursor so
//! that unaffiliated work spreads across workers over time.
//!
//! Queues never grow past their configured capacity: a blocking `submit`
//! waits for space, a `try_submit` hands the item back inside
//! [`TrySubmitError`]. Shutdown comes in two flavors - `stop(true)` finishes
//! everything already queued before the workers terminate, `stop(false)`
//! discards the backlog and returns without waiting.
//!
//! # Pool variants
//!
//! Two interchangeable backing strategies implement the same contract:
//!
//! - [`AffinityPool`] - each queue pairs a mutex with "not empty"/"not full"
//!   condition variables; blocked threads suspend and are woken.
//! - [`LockFreeAffinityPool`] - each queue is a fixed-capacity lock-free
//!   FIFO; nothing suspends, retries stall according to a [`WaitPolicy`]
//!   (busy-spin or a fixed sleep interval).
//!
//! Two further pools drop the per-worker queues for one shared mailbox, for
//! callers that need load balancing but no locality control:
//!
//! - [`MailboxPool`] - blocking shared mailbox.
//! - [`LockFreeMailboxPool`] - lock-free shared mailbox; a full mailbox runs
//!   the item on the submitting thread instead of waiting.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use affinity_pool::{Affinity, AffinityPool};
//! use new_zealand::nz;
//!
//! let primes = Arc::new(AtomicUsize::new(0));
//!
//! let pool = AffinityPool::builder()
//!     .worker_count(nz!(4))
//!     .build({
//!         let primes = Arc::clone(&primes);
//!         move |candidate: u64| {
//!             let is_prime = candidate > 1
//!                 && (2..=candidate.isqrt()).all(|divisor| candidate % divisor != 0);
//!             if is_prime {
//!                 primes.fetch_add(1, Ordering::Relaxed);
//!             }
//!         }
//!     });
//!
//! for candidate in 0..100 {
//!     pool.submit(candidate, Affinity::Any);
//! }
//!
//! pool.stop(true);
//!
//! assert_eq!(primes.load(Ordering::Relaxed), 25);
//! ```
//!
//! # Ordering guarantees
//!
//! Items on one queue are processed in arrival order at that queue; nothing
//! is guaranteed across queues. An item successfully submitted while the
//! pool is running is seen by exactly one worker - no duplication, no silent
//! drop. The pool never observes the processing function's outcome: handling
//! failures (and synchronizing any shared state the function closes over) is
//! the caller's business.

use std::num::NonZero;

use new_zealand::nz;

mod affinity;
mod bounded_queue;
mod constants;
mod error;
mod handler;
mod lockfree_mailbox;
mod lockfree_pool;
mod lockfree_pool_builder;
mod mailbox;
mod pool;
mod pool_builder;
mod shutdown;
mod wait_policy;

pub use affinity::Affinity;
pub(crate) use bounded_queue::*;
pub(crate) use constants::*;
pub use error::TrySubmitError;
pub(crate) use handler::*;
pub use lockfree_mailbox::LockFreeMailboxPool;
pub use lockfree_pool::LockFreeAffinityPool;
pub use lockfree_pool_builder::LockFreeAffinityPoolBuilder;
pub use mailbox::MailboxPool;
pub use pool::AffinityPool;
pub use pool_builder::AffinityPoolBuilder;
pub(crate) use shutdown::*;
pub use wait_policy::WaitPolicy;

/// Queue capacity used when a pool is built without an explicit capacity.
pub const DEFAULT_QUEUE_CAPACITY: NonZero<usize> = nz!(512);
