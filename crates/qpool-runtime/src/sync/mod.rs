//! Mutex + condition variable pair behind one capability interface
//!
//! Every queue owns exactly one primitive. Platform-specific backends:
//!
//! - `PthreadSync` (unix): `pthread_mutex_t` (error-checking) and a
//!   `pthread_cond_t` bound to `CLOCK_MONOTONIC` where the platform allows.
//! - `CondvarSync` (everything else, or unix with `portable-sync`): a lock
//!   built from `std::sync::{Mutex, Condvar}`, which maps onto SRW locks and
//!   condition variables on Windows.
//!
//! Both report misuse the same way: relocking from the owner fails with
//! `EDEADLK`, unlocking or waiting from a non-owner fails with `EPERM`.

use qpool_core::error::SyncResult;

use crate::clock::{ClockSource, Deadline};

mod condvar;
pub use condvar::CondvarSync;

#[cfg(test)]
pub(crate) mod testing;

cfg_if::cfg_if! {
    if #[cfg(all(unix, not(feature = "portable-sync")))] {
        mod pthread;
        pub use pthread::PthreadSync;
        pub use pthread::PthreadSync as PlatformSync;
    } else {
        pub use condvar::CondvarSync as PlatformSync;
    }
}

/// Which waiters a notify wakes
///
/// Producers and consumers share one condition variable. Under `Signal` a
/// queue therefore broadcasts anyway whenever both kinds are blocked, so a
/// wakeup never lands on a thread that cannot use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Wake at most one waiter
    Signal,
    /// Wake every waiter; each re-checks its predicate
    Broadcast,
}

impl NotifyPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "signal" | "one" => Some(NotifyPolicy::Signal),
            "broadcast" | "all" => Some(NotifyPolicy::Broadcast),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NotifyPolicy::Signal => "signal",
            NotifyPolicy::Broadcast => "broadcast",
        }
    }
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        NotifyPolicy::Broadcast
    }
}

/// Outcome of a timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by notify (or spuriously); re-check the predicate
    Notified,
    /// Deadline passed; the mutex is held again
    TimedOut,
}

/// Native mutex + condition variable
///
/// Destruction happens exactly once, when the value is dropped.
pub trait SyncPrimitive: Send + Sync + Sized {
    /// Create an unlocked primitive with a fixed notify policy
    fn create(policy: NotifyPolicy) -> SyncResult<Self>;

    /// Acquire the mutex. On error the mutex is not held.
    fn lock(&self) -> SyncResult<()>;

    /// Release the mutex held by the calling thread
    fn unlock(&self) -> SyncResult<()>;

    /// Release the mutex, sleep until notified, reacquire before returning.
    ///
    /// On error the mutex is still held by the caller.
    fn wait(&self) -> SyncResult<()>;

    /// As `wait`, bounded by `deadline`
    fn timed_wait(&self, deadline: &Deadline) -> SyncResult<WaitStatus>;

    /// Wake waiters according to `policy()`
    fn notify(&self) -> SyncResult<()>;

    /// Wake every waiter regardless of `policy()`
    fn notify_all(&self) -> SyncResult<()>;

    /// Clock timed waits are measured against
    fn clock(&self) -> ClockSource;

    fn policy(&self) -> NotifyPolicy;
}
