use std::collections::VecDeque;
use std::num::NonZero;
use std::sync::{Arc, Condvar, Mutex};

use crate::{ERR_POISONED_LOCK, ShutdownFlag, TrySubmitError};

/// A fixed-capacity blocking FIFO, shared by any number of producers and one
/// consuming worker.
///
/// All state lives under a single mutex, with one condition per direction:
/// `not_empty` wakes the consumer, `not_full` wakes blocked producers. Every
/// wait re-checks its predicate in a loop, so spurious wakeups are harmless.
/// At no observable instant does the queue hold more than `capacity` items.
///
/// The queue observes its pool's [`ShutdownFlag`]: once shutdown begins, in
/// either mode, pushes are refused, and once the discarding mode is selected
/// pops report the terminal state even if items remain (the shutdown
/// controller clears them without processing).
#[derive(Debug)]
pub(crate) struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: NonZero<usize>,
    shutdown: Arc<ShutdownFlag>,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn new(capacity: NonZero<usize>, shutdown: Arc<ShutdownFlag>) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.get())),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            shutdown,
        }
    }

    /// Appends an item, waiting for free capacity if necessary.
    ///
    /// Returns the item back as `Err` if shutdown begins before space frees
    /// up (or had already begun); a stopped queue never grows.
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

        while items.len() == self.capacity.get() && !self.shutdown.is_stopping() {
            items = self.not_full.wait(items).expect(ERR_POISONED_LOCK);
        }

        if self.shutdown.is_stopping() {
            return Err(item);
        }

        items.push_back(item);
        drop(items);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Appends an item only if capacity is free right now.
    pub(crate) fn try_push(&self, item: T) -> Result<(), TrySubmitError<T>> {
        let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

        if self.shutdown.is_stopping() {
            return Err(TrySubmitError::Stopped(item));
        }

        if items.len() == self.capacity.get() {
            return Err(TrySubmitError::Full(item));
        }

        items.push_back(item);
        drop(items);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the front item, waiting for one to arrive if necessary.
    ///
    /// `None` is terminal: the queue is empty and shutdown has begun (or the
    /// discarding mode was selected, which abandons remaining items to the
    /// shutdown controller). A queue that still holds items after a draining
    /// shutdown keeps handing them out until empty.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

        while items.is_empty() && !self.shutdown.is_stopping() {
            items = self.not_empty.wait(items).expect(ERR_POISONED_LOCK);
        }

        if self.shutdown.is_discarding() {
            return None;
        }

        let item = items.pop_front()?;
        drop(items);

        self.not_full.notify_one();
        Some(item)
    }

    /// Removes the front item only if one is present right now.
    #[cfg_attr(
        not(test),
        expect(
            dead_code,
            reason = "non-blocking consume completes the queue surface; the pools drain via pop"
        )
    )]
    pub(crate) fn try_pop(&self) -> Option<T> {
        let mut items = self.items.lock().expect(ERR_POISONED_LOCK);

        if self.shutdown.is_discarding() {
            return None;
        }

        let item = items.pop_front()?;
        drop(items);

        self.not_full.notify_one();
        Some(item)
    }

    /// Number of items currently queued.
    pub(crate) fn len(&self) -> usize {
        self.items.lock().expect(ERR_POISONED_LOCK).len()
    }

    /// Empties the queue without handing any item to a consumer.
    ///
    /// Used by the hard-stop path; the discarded items are dropped here.
    pub(crate) fn discard_all(&self) {
        self.items.lock().expect(ERR_POISONED_LOCK).clear();
    }

    /// Wakes every blocked producer and consumer so they can re-check the
    /// shutdown flag.
    ///
    /// Taking the lock first orders this wakeup after any waiter's predicate
    /// check: a waiter has either already observed the flag or is inside the
    /// wait and receives the notification.
    pub(crate) fn wake_all(&self) {
        drop(self.items.lock().expect(ERR_POISONED_LOCK));

        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
