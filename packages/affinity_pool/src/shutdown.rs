use std::sync::atomic::{AtomicU8, Ordering};

/// How a stopping pool treats work that is already queued.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ShutdownMode {
    /// Queued items are still handed to workers; the pool only refuses new
    /// submissions.
    Drain,

    /// Queued items are discarded without being processed.
    Discard,
}

const RUNNING: u8 = 0;
const DRAIN: u8 = 1;
const DISCARD: u8 = 2;

/// The one-way stop indicator shared by every queue, worker and submitter
/// of one pool.
///
/// Starts out running and transitions at most once, to either the draining
/// or the discarding flavor of "stopped". The transition is a compare-exchange
/// so that exactly one `stop` call wins; the flag is never reset.
#[derive(Debug)]
pub(crate) struct ShutdownFlag {
    state: AtomicU8,
}

impl ShutdownFlag {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Attempts the one-way transition out of the running state.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// flag had already left the running state (in which case the requested
    /// mode is ignored).
    pub(crate) fn begin(&self, mode: ShutdownMode) -> bool {
        let target = match mode {
            ShutdownMode::Drain => DRAIN,
            ShutdownMode::Discard => DISCARD,
        };

        self.state
            .compare_exchange(RUNNING, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether shutdown has begun, in either mode.
    pub(crate) fn is_stopping(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    /// Whether shutdown has begun in the mode that discards queued work.
    pub(crate) fn is_discarding(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISCARD
    }
}
