//! Timeouts and absolute deadlines for timed condition waits
//!
//! A relative millisecond timeout is turned into an absolute deadline on
//! the same clock the condition variable measures against. On unix that is
//! `CLOCK_MONOTONIC` whenever the condvar can be bound to it, wall-clock
//! time otherwise.
//!
//! `CLOCK_MONOTONIC_RAW` is never used: timed waits against it
//! report `ETIMEDOUT` immediately on some kernels.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use qpool_core::error::{SyncError, SyncOp, SyncResult};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Block until the queue changes state
    Infinite,
    /// Give up after this many milliseconds; `0` polls once
    Millis(u64),
}

impl Timeout {
    /// Negative values mean "block indefinitely"; `0` is an immediate poll.
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Timeout::Infinite
        } else {
            Timeout::Millis(ms as u64)
        }
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Millis(d.as_millis().min(u64::MAX as u128) as u64)
    }
}

/// Seconds + nanoseconds, `nsec` always in `[0, 1e9)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    sec: i64,
    nsec: i64,
}

impl Timespec {
    /// Build a normalized timespec; nanosecond overflow carries into seconds.
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self {
            sec: sec.saturating_add(nsec.div_euclid(NANOS_PER_SEC)),
            nsec: nsec.rem_euclid(NANOS_PER_SEC),
        }
    }

    #[inline]
    pub fn sec(&self) -> i64 {
        self.sec
    }

    #[inline]
    pub fn nsec(&self) -> i64 {
        self.nsec
    }

    pub fn add_millis(self, ms: u64) -> Self {
        let secs = (ms / 1000).min(i64::MAX as u64) as i64;
        let nanos = (ms % 1000) as i64 * NANOS_PER_MILLI;
        Self::new(self.sec.saturating_add(secs), self.nsec + nanos)
    }

    /// Time from `earlier` to `self`, zero if `earlier` is not before `self`
    pub fn saturating_since(self, earlier: Timespec) -> Duration {
        if self <= earlier {
            return Duration::ZERO;
        }
        let diff = Timespec::new(self.sec - earlier.sec, self.nsec - earlier.nsec);
        Duration::new(diff.sec as u64, diff.nsec as u32)
    }

    #[cfg(unix)]
    pub fn to_libc(self) -> libc::timespec {
        // Some targets pad timespec with private fields; start from zeroed.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = self.sec as libc::time_t;
        ts.tv_nsec = self.nsec as _;
        ts
    }
}

/// Clock a deadline is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Monotonic,
    Realtime,
}

impl ClockSource {
    pub fn now(self) -> SyncResult<Timespec> {
        match self {
            ClockSource::Monotonic => monotonic_now(),
            ClockSource::Realtime => realtime_now(),
        }
    }
}

#[cfg(unix)]
fn monotonic_now() -> SyncResult<Timespec> {
    use nix::time::{clock_gettime, ClockId};

    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map_err(|e| SyncError::new(SyncOp::Clock, e as i32))?;
    Ok(Timespec::new(ts.tv_sec() as i64, ts.tv_nsec() as i64))
}

#[cfg(not(unix))]
fn monotonic_now() -> SyncResult<Timespec> {
    use std::sync::OnceLock;
    use std::time::Instant;

    // Process-local epoch; only differences between readings matter.
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
    Ok(Timespec::new(elapsed.as_secs() as i64, elapsed.subsec_nanos() as i64))
}

fn realtime_now() -> SyncResult<Timespec> {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| SyncError::new(SyncOp::Clock, libc::EINVAL))?;
    Ok(Timespec::new(since.as_secs() as i64, since.subsec_nanos() as i64))
}

/// Absolute point at which a timed wait gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Never,
    At { at: Timespec, clock: ClockSource },
}

impl Deadline {
    /// Deadline `timeout` from now on `clock`
    pub fn after(timeout: Timeout, clock: ClockSource) -> SyncResult<Self> {
        match timeout {
            Timeout::Infinite => Ok(Deadline::Never),
            Timeout::Millis(ms) => Ok(Deadline::At {
                at: clock.now()?.add_millis(ms),
                clock,
            }),
        }
    }

    /// Time left before expiry; `None` for a deadline that never expires
    pub fn remaining(&self) -> SyncResult<Option<Duration>> {
        match *self {
            Deadline::Never => Ok(None),
            Deadline::At { at, clock } => Ok(Some(at.saturating_since(clock.now()?))),
        }
    }

    pub fn is_expired(&self) -> SyncResult<bool> {
        Ok(matches!(self.remaining()?, Some(d) if d.is_zero()))
    }
}
