//! Portable backend built on `std::sync::{Mutex, Condvar}`
//!
//! The queue needs a mutex it can hold across calls (manual locking), which
//! a std `MutexGuard` cannot express. So the lock itself is a flag inside
//! a short-lived std mutex:
//!
//! - `owner` is the thread holding the queue lock, if any
//! - `handoff` wakes threads waiting for the lock
//! - `wakeup` wakes threads in `wait`/`timed_wait`; `epoch` counts notifies
//!   so a waiter can tell a notify from a spurious return
//!
//! Used on every non-unix target and on unix with `portable-sync`.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use qpool_core::error::{SyncError, SyncOp, SyncResult};

use super::{NotifyPolicy, SyncPrimitive, WaitStatus};
use crate::clock::{ClockSource, Deadline};

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    epoch: u64,
}

/// Mutex + condvar emulated on top of std primitives
pub struct CondvarSync {
    state: Mutex<LockState>,
    handoff: Condvar,
    wakeup: Condvar,
    policy: NotifyPolicy,
}

impl CondvarSync {
    // Nothing panics while `state` is held, so a poisoned lock still holds
    // consistent data.
    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give up ownership; fails with `EPERM` for non-owners
    fn release(&self, st: &mut LockState, op: SyncOp) -> SyncResult<()> {
        if st.owner != Some(thread::current().id()) {
            return Err(SyncError::new(op, libc::EPERM));
        }
        st.owner = None;
        self.handoff.notify_one();
        Ok(())
    }

    fn wake(&self, policy: NotifyPolicy) {
        let mut st = self.state();
        st.epoch = st.epoch.wrapping_add(1);
        match policy {
            NotifyPolicy::Signal => self.wakeup.notify_one(),
            NotifyPolicy::Broadcast => self.wakeup.notify_all(),
        }
    }

    fn acquire<'a>(&'a self, mut st: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        while st.owner.is_some() {
            st = self.handoff.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        st.owner = Some(thread::current().id());
        st
    }
}

impl SyncPrimitive for CondvarSync {
    fn create(policy: NotifyPolicy) -> SyncResult<Self> {
        Ok(Self {
            state: Mutex::new(LockState::default()),
            handoff: Condvar::new(),
            wakeup: Condvar::new(),
            policy,
        })
    }

    fn lock(&self) -> SyncResult<()> {
        let st = self.state();
        if st.owner == Some(thread::current().id()) {
            return Err(SyncError::new(SyncOp::Lock, libc::EDEADLK));
        }
        drop(self.acquire(st));
        Ok(())
    }

    fn unlock(&self) -> SyncResult<()> {
        let mut st = self.state();
        self.release(&mut st, SyncOp::Unlock)
    }

    fn wait(&self) -> SyncResult<()> {
        let mut st = self.state();
        self.release(&mut st, SyncOp::Wait)?;
        let epoch = st.epoch;
        while st.epoch == epoch {
            st = self.wakeup.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        drop(self.acquire(st));
        Ok(())
    }

    fn timed_wait(&self, deadline: &Deadline) -> SyncResult<WaitStatus> {
        if *deadline == Deadline::Never {
            return self.wait().map(|()| WaitStatus::Notified);
        }

        let mut st = self.state();
        self.release(&mut st, SyncOp::TimedWait)?;
        let epoch = st.epoch;
        let status = loop {
            if st.epoch != epoch {
                break Ok(WaitStatus::Notified);
            }
            let left = match deadline.remaining() {
                Ok(Some(left)) if !left.is_zero() => left,
                Ok(_) => break Ok(WaitStatus::TimedOut),
                Err(e) => break Err(e),
            };
            st = self
                .wakeup
                .wait_timeout(st, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        };
        // Held again on every return path, errors included
        drop(self.acquire(st));
        status
    }

    fn notify(&self) -> SyncResult<()> {
        self.wake(self.policy);
        Ok(())
    }

    fn notify_all(&self) -> SyncResult<()> {
        self.wake(NotifyPolicy::Broadcast);
        Ok(())
    }

    #[inline]
    fn clock(&self) -> ClockSource {
        ClockSource::Monotonic
    }

    #[inline]
    fn policy(&self) -> NotifyPolicy {
        self.policy
    }
}

impl std::fmt::Debug for CondvarSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state();
        f.debug_struct("CondvarSync")
            .field("owner", &st.owner)
            .field("epoch", &st.epoch)
            .field("policy", &self.policy)
            .finish()
    }
}
