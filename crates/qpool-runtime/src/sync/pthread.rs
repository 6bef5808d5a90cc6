//! POSIX backend: `pthread_mutex_t` + `pthread_cond_t`
//!
//! The mutex is `PTHREAD_MUTEX_ERRORCHECK`, so a relock from the owner
//! returns `EDEADLK` and an unlock from another thread returns `EPERM`
//! instead of hanging or corrupting the lock.
//!
//! The condvar is bound to `CLOCK_MONOTONIC` with `pthread_condattr_setclock`.
//! Apple targets lack that call, so their condvars (and deadlines) use
//! wall-clock time.
//!
//! Both objects are boxed: pthread objects must not move after init.

use core::cell::UnsafeCell;

use qpool_core::error::{SyncError, SyncOp, SyncResult};
use qpool_core::kwarn;

use super::{NotifyPolicy, SyncPrimitive, WaitStatus};
use crate::clock::{ClockSource, Deadline};

/// Error-checking pthread mutex paired with its condition variable
pub struct PthreadSync {
    mutex: Box<UnsafeCell<libc::pthread_mutex_t>>,
    cond: Box<UnsafeCell<libc::pthread_cond_t>>,
    clock: ClockSource,
    policy: NotifyPolicy,
}

// Safety: pthread mutexes and condvars are designed for cross-thread use;
// they are only touched through the pthread API.
unsafe impl Send for PthreadSync {}
unsafe impl Sync for PthreadSync {}

#[inline]
fn check(op: SyncOp, rc: libc::c_int) -> SyncResult<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(SyncError::new(op, rc))
    }
}

impl PthreadSync {
    fn init_mutex(mutex: *mut libc::pthread_mutex_t) -> SyncResult<()> {
        unsafe {
            let mut attr: libc::pthread_mutexattr_t = core::mem::zeroed();
            check(SyncOp::Init, libc::pthread_mutexattr_init(&mut attr))?;
            let rc = libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_ERRORCHECK);
            if rc != 0 {
                libc::pthread_mutexattr_destroy(&mut attr);
                return Err(SyncError::new(SyncOp::Init, rc));
            }
            let rc = libc::pthread_mutex_init(mutex, &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
            check(SyncOp::Init, rc)
        }
    }

    /// Init the condvar; returns the clock its timed waits measure against.
    fn init_cond(cond: *mut libc::pthread_cond_t) -> SyncResult<ClockSource> {
        unsafe {
            let mut attr: libc::pthread_condattr_t = core::mem::zeroed();
            check(SyncOp::Init, libc::pthread_condattr_init(&mut attr))?;
            let clock = bind_monotonic(&mut attr);
            let rc = libc::pthread_cond_init(cond, &attr);
            libc::pthread_condattr_destroy(&mut attr);
            check(SyncOp::Init, rc)?;
            Ok(clock)
        }
    }

    #[inline]
    fn mutex_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.mutex.get()
    }

    #[inline]
    fn cond_ptr(&self) -> *mut libc::pthread_cond_t {
        self.cond.get()
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos")))]
unsafe fn bind_monotonic(attr: &mut libc::pthread_condattr_t) -> ClockSource {
    if libc::pthread_condattr_setclock(attr, libc::CLOCK_MONOTONIC) == 0 {
        ClockSource::Monotonic
    } else {
        ClockSource::Realtime
    }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
unsafe fn bind_monotonic(_attr: &mut libc::pthread_condattr_t) -> ClockSource {
    ClockSource::Realtime
}

impl SyncPrimitive for PthreadSync {
    fn create(policy: NotifyPolicy) -> SyncResult<Self> {
        let mutex = Box::new(UnsafeCell::new(unsafe { core::mem::zeroed() }));
        let cond = Box::new(UnsafeCell::new(unsafe { core::mem::zeroed() }));

        Self::init_mutex(mutex.get())?;
        let clock = match Self::init_cond(cond.get()) {
            Ok(clock) => clock,
            Err(e) => {
                unsafe { libc::pthread_mutex_destroy(mutex.get()) };
                return Err(e);
            }
        };

        Ok(Self { mutex, cond, clock, policy })
    }

    fn lock(&self) -> SyncResult<()> {
        check(SyncOp::Lock, unsafe { libc::pthread_mutex_lock(self.mutex_ptr()) })
    }

    fn unlock(&self) -> SyncResult<()> {
        check(SyncOp::Unlock, unsafe { libc::pthread_mutex_unlock(self.mutex_ptr()) })
    }

    fn wait(&self) -> SyncResult<()> {
        check(SyncOp::Wait, unsafe {
            libc::pthread_cond_wait(self.cond_ptr(), self.mutex_ptr())
        })
    }

    fn timed_wait(&self, deadline: &Deadline) -> SyncResult<WaitStatus> {
        let at = match *deadline {
            Deadline::Never => return self.wait().map(|()| WaitStatus::Notified),
            Deadline::At { at, clock } => {
                debug_assert_eq!(clock, self.clock, "deadline built on the wrong clock");
                at
            }
        };
        let ts = at.to_libc();
        match unsafe { libc::pthread_cond_timedwait(self.cond_ptr(), self.mutex_ptr(), &ts) } {
            0 => Ok(WaitStatus::Notified),
            libc::ETIMEDOUT => Ok(WaitStatus::TimedOut),
            rc => Err(SyncError::new(SyncOp::TimedWait, rc)),
        }
    }

    fn notify(&self) -> SyncResult<()> {
        let rc = unsafe {
            match self.policy {
                NotifyPolicy::Signal => libc::pthread_cond_signal(self.cond_ptr()),
                NotifyPolicy::Broadcast => libc::pthread_cond_broadcast(self.cond_ptr()),
            }
        };
        check(SyncOp::Notify, rc)
    }

    fn notify_all(&self) -> SyncResult<()> {
        check(SyncOp::Notify, unsafe { libc::pthread_cond_broadcast(self.cond_ptr()) })
    }

    #[inline]
    fn clock(&self) -> ClockSource {
        self.clock
    }

    #[inline]
    fn policy(&self) -> NotifyPolicy {
        self.policy
    }
}

impl Drop for PthreadSync {
    fn drop(&mut self) {
        let rc = unsafe { libc::pthread_cond_destroy(self.cond_ptr()) };
        if rc != 0 {
            kwarn!("{}", SyncError::new(SyncOp::Destroy, rc));
        }
        let rc = unsafe { libc::pthread_mutex_destroy(self.mutex_ptr()) };
        if rc != 0 {
            kwarn!("{}", SyncError::new(SyncOp::Destroy, rc));
        }
    }
}
