// A poisoned lock means a thread panicked while mutating queue state, so the
// capacity and ordering invariants can no longer be trusted (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because the queue's capacity and ordering invariants may no longer hold";
