//! Fault-injecting primitive for unit tests
//!
//! Wraps `CondvarSync`. Counters and failure switches are thread-local so
//! parallel tests never see each other's state; queues and pools under test
//! must be built (and dropped) on the test thread.

use std::cell::Cell;

use qpool_core::error::{SyncError, SyncOp, SyncResult};

use super::{CondvarSync, NotifyPolicy, SyncPrimitive, WaitStatus};
use crate::clock::{ClockSource, Deadline};

thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
    static DESTROYED: Cell<usize> = const { Cell::new(0) };
    static FAIL_CREATE_AT: Cell<usize> = const { Cell::new(0) };
    static FAIL_NOTIFY: Cell<bool> = const { Cell::new(false) };
}

/// Reset counters; `create` number `fail_at` (1-based) fails, 0 never
pub(crate) fn reset(fail_at: usize) {
    CREATED.with(|c| c.set(0));
    DESTROYED.with(|c| c.set(0));
    FAIL_CREATE_AT.with(|c| c.set(fail_at));
    FAIL_NOTIFY.with(|c| c.set(false));
}

pub(crate) fn created() -> usize {
    CREATED.with(Cell::get)
}

pub(crate) fn destroyed() -> usize {
    DESTROYED.with(Cell::get)
}

/// Make every notify on this thread fail with `EINVAL`
pub(crate) fn fail_notify(on: bool) {
    FAIL_NOTIFY.with(|c| c.set(on));
}

pub(crate) struct FlakySync {
    inner: CondvarSync,
}

impl FlakySync {
    fn notify_result(&self) -> SyncResult<()> {
        if FAIL_NOTIFY.with(Cell::get) {
            return Err(SyncError::new(SyncOp::Notify, libc::EINVAL));
        }
        Ok(())
    }
}

impl SyncPrimitive for FlakySync {
    fn create(policy: NotifyPolicy) -> SyncResult<Self> {
        let n = CREATED.with(|c| {
            c.set(c.get() + 1);
            c.get()
        });
        if n == FAIL_CREATE_AT.with(Cell::get) {
            return Err(SyncError::new(SyncOp::Init, libc::ENOMEM));
        }
        Ok(Self { inner: CondvarSync::create(policy)? })
    }

    fn lock(&self) -> SyncResult<()> {
        self.inner.lock()
    }

    fn unlock(&self) -> SyncResult<()> {
        self.inner.unlock()
    }

    fn wait(&self) -> SyncResult<()> {
        self.inner.wait()
    }

    fn timed_wait(&self, deadline: &Deadline) -> SyncResult<WaitStatus> {
        self.inner.timed_wait(deadline)
    }

    fn notify(&self) -> SyncResult<()> {
        self.notify_result()?;
        self.inner.notify()
    }

    fn notify_all(&self) -> SyncResult<()> {
        self.notify_result()?;
        self.inner.notify_all()
    }

    fn clock(&self) -> ClockSource {
        self.inner.clock()
    }

    fn policy(&self) -> NotifyPolicy {
        self.inner.policy()
    }
}

impl Drop for FlakySync {
    fn drop(&mut self) {
        DESTROYED.with(|c| c.set(c.get() + 1));
    }
}
