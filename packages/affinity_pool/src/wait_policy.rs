use std::hint;
use std::thread;
use std::time::Duration;

/// Backoff applied by the lock-free pools whenever a queue operation has to
/// be retried.
///
/// The lock-free queues have no blocking primitive of their own, so a worker
/// finding its queue empty (or a submitter finding every eligible queue full)
/// retries in a loop, stalling between attempts according to this policy.
/// [`Spin`][WaitPolicy::Spin] burns CPU for the lowest reaction latency;
/// [`Sleep`][WaitPolicy::Sleep] idles the thread for a fixed interval between
/// attempts, trading up to one interval of extra latency for a mostly idle
/// CPU.
///
/// The interval is a backoff, not a timeout: a blocking operation retries
/// until it succeeds or the pool stops, no matter how many intervals pass.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use affinity_pool::WaitPolicy;
///
/// // Busy-wait, the historical "wait time zero" configuration.
/// assert_eq!(WaitPolicy::from_micros(0), WaitPolicy::Spin);
///
/// // Sleep 50 microseconds between attempts.
/// assert_eq!(
///     WaitPolicy::from_micros(50),
///     WaitPolicy::Sleep(Duration::from_micros(50))
/// );
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum WaitPolicy {
    /// Busy-spin with a CPU relaxation hint between attempts. This is the
    /// default.
    #[default]
    Spin,

    /// Sleep for the given interval between attempts.
    Sleep(Duration),
}

impl WaitPolicy {
    /// Creates the policy matching a wait time in microseconds, where zero
    /// selects busy-spinning.
    #[must_use]
    pub fn from_micros(wait_time: u64) -> Self {
        if wait_time == 0 {
            Self::Spin
        } else {
            Self::Sleep(Duration::from_micros(wait_time))
        }
    }

    /// Stalls the calling thread for one retry interval.
    pub(crate) fn idle(self) {
        match self {
            Self::Spin => hint::spin_loop(),
            Self::Sleep(interval) => thread::sleep(interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(WaitPolicy: Copy, Send, Sync);

    #[test]
    fn default_is_spin() {
        assert_eq!(WaitPolicy::default(), WaitPolicy::Spin);
    }

    #[test]
    fn zero_micros_means_busy_wait() {
        assert_eq!(WaitPolicy::from_micros(0), WaitPolicy::Spin);
    }

    #[test]
    fn nonzero_micros_means_sleep() {
        assert_eq!(
            WaitPolicy::from_micros(250),
            WaitPolicy::Sleep(Duration::from_micros(250))
        );
    }

    #[test]
    fn sleep_idles_for_at_least_the_interval() {
        let interval = Duration::from_millis(5);
        let policy = WaitPolicy::Sleep(interval);

        let start = Instant::now();
        policy.idle();

        assert!(start.elapsed() >= interval);
    }

    #[test]
    fn spin_idle_returns_promptly() {
        // A single spin hint must not stall the thread in any measurable way;
        // this is a smoke test that it returns at all.
        WaitPolicy::Spin.idle();
    }
}
