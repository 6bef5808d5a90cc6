//! Bounded blocking queue
//!
//! A fixed-capacity store guarded by one `SyncPrimitive`. Producers block
//! while it is full, consumers while it is empty.
//!
//! # Ordering
//!
//! Despite the name the container is **LIFO**: `get` returns the value
//! most recently `put`. Both ends are O(1) and no value is ever shifted.
//!
//! # Access patterns
//!
//! - Blocking: `put` / `get`
//! - Timed: `put_timeout` / `get_timeout` (negative ms blocks forever,
//!   `0` polls once)
//! - Manual critical section: `lock()` returns a `QueueGuard` whose
//!   `put_nolock` / `get_nolock` never block and never notify;
//!   `guard.unlock(true)` wakes waiters once for the whole batch
//! - Raw manual locking for embedders that cannot keep a guard alive:
//!   `lock_raw` / `put_nolock` / `get_nolock` / `unlock_raw`
//!
//! Calling a blocking operation while holding the lock reports `EDEADLK`
//! from the mutex instead of hanging.
//!
//! # Notify policy
//!
//! Producers and consumers sleep on the same condition variable. The queue
//! counts blocked producers and consumers; under `NotifyPolicy::Signal` it
//! broadcasts whenever both kinds are blocked, otherwise a single wakeup
//! could land on a thread whose predicate is still false.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use qpool_core::error::{PutError, QueueError, QueueResult, SyncResult};
use qpool_core::{ktrace, kwarn};

use crate::clock::{Deadline, Timeout};
use crate::config::PoolConfig;
use crate::sync::{NotifyPolicy, PlatformSync, SyncPrimitive, WaitStatus};

static NEXT_THREAD_TOKEN: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_TOKEN: usize = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Non-zero id of the calling thread, never reused within the process
#[inline]
fn thread_token() -> usize {
    THREAD_TOKEN.with(|t| *t)
}

/// Fixed-capacity LIFO of `T`, blocking on full/empty
pub struct BoundedQueue<T, S: SyncPrimitive = PlatformSync> {
    sync: S,

    /// Occupied slots are `slots[..len]`; never grows past `capacity`
    slots: UnsafeCell<Vec<T>>,

    capacity: usize,

    /// Mirror of `slots.len()`, written under the lock, readable without it
    count: AtomicUsize,

    /// `thread_token()` of the lock holder, 0 when unlocked
    owner: AtomicUsize,

    /// Threads blocked in `put` / `get`; written under the lock
    waiting_puts: AtomicUsize,
    waiting_gets: AtomicUsize,
}

// Safety: `slots` is only touched by the thread recorded in `owner`, which
// holds `sync`'s mutex.
unsafe impl<T: Send, S: SyncPrimitive> Send for BoundedQueue<T, S> {}
unsafe impl<T: Send, S: SyncPrimitive> Sync for BoundedQueue<T, S> {}

impl<T> BoundedQueue<T> {
    /// Queue on the platform's native primitive
    pub fn new(capacity: usize, policy: NotifyPolicy) -> QueueResult<Self> {
        Self::with_sync(capacity, policy)
    }

    pub fn with_config(config: &PoolConfig) -> QueueResult<Self> {
        config.validate()?;
        Self::new(config.queue_capacity, config.notify_policy)
    }
}

impl<T, S: SyncPrimitive> BoundedQueue<T, S> {
    /// Queue on an explicit primitive type
    pub fn with_sync(capacity: usize, policy: NotifyPolicy) -> QueueResult<Self> {
        if capacity == 0 {
            return Err(QueueError::InvalidArgument("queue capacity must be > 0"));
        }
        // All slots up front; pushes never reallocate afterwards
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::InvalidArgument("queue capacity too large to allocate"))?;

        Ok(Self {
            sync: S::create(policy)?,
            slots: UnsafeCell::new(slots),
            capacity,
            count: AtomicUsize::new(0),
            owner: AtomicUsize::new(0),
            waiting_puts: AtomicUsize::new(0),
            waiting_gets: AtomicUsize::new(0),
        })
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored values.
    ///
    /// Read without the lock; hold `lock()` for a consistent snapshot.
    #[inline]
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.sync.policy()
    }

    /// Whether the calling thread holds this queue's lock
    #[inline]
    pub fn is_locked_by_current(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == thread_token()
    }

    // ------------------------------------------------------------------
    // Blocking and timed operations
    // ------------------------------------------------------------------

    /// Store `value`, blocking while the queue is full
    pub fn put(&self, value: T) -> Result<(), PutError<T>> {
        self.put_until(value, Timeout::Infinite)
    }

    /// As `put`, giving up after `timeout_ms`.
    ///
    /// On `TimedOut` the value is handed back and nothing was enqueued.
    pub fn put_timeout(&self, value: T, timeout_ms: i64) -> Result<(), PutError<T>> {
        self.put_until(value, Timeout::from_millis(timeout_ms))
    }

    pub fn put_until(&self, value: T, timeout: Timeout) -> Result<(), PutError<T>> {
        let deadline = match Deadline::after(timeout, self.sync.clock()) {
            Ok(d) => d,
            Err(e) => return Err(PutError::rejected(value, e.into())),
        };
        if let Err(e) = self.enter() {
            return Err(PutError::rejected(value, e));
        }
        if let Err(e) = self.wait_while(|len| len >= self.capacity, &self.waiting_puts, &deadline) {
            return Err(PutError::rejected(value, e));
        }

        // Safety: lock held
        unsafe { self.push_locked(value) };
        self.finish_locked(true).map_err(PutError::after_enqueue)
    }

    /// Take the most recently stored value, blocking while empty
    pub fn get(&self) -> QueueResult<T> {
        self.get_until(Timeout::Infinite)
    }

    /// As `get`, giving up after `timeout_ms`
    pub fn get_timeout(&self, timeout_ms: i64) -> QueueResult<T> {
        self.get_until(Timeout::from_millis(timeout_ms))
    }

    pub fn get_until(&self, timeout: Timeout) -> QueueResult<T> {
        let deadline = Deadline::after(timeout, self.sync.clock())?;
        self.enter()?;
        self.wait_while(|len| len == 0, &self.waiting_gets, &deadline)?;

        // Waiters only run once we unlock, so waking them before the pop is
        // equivalent, and a failed notify leaves the value queued.
        if let Err(e) = self.wake() {
            return Err(self.bail(e.into()));
        }
        // Safety: lock held, and the wait guarantees a value
        let value = unsafe { self.pop_locked() };

        self.owner.store(0, Ordering::Relaxed);
        if let Err(e) = self.sync.unlock() {
            self.owner.store(thread_token(), Ordering::Relaxed);
            if let Some(v) = value {
                // Safety: still locked, and the pop just freed this slot
                unsafe { self.push_locked(v) };
            }
            return Err(e.into());
        }
        value.ok_or(QueueError::Empty)
    }

    /// Drop every stored value and wake producers blocked on a full queue
    ///
    /// Values are dropped after the lock is released.
    pub fn clear(&self) -> QueueResult<()> {
        self.enter()?;
        // Safety: lock held. The drained copy is sized to what was stored;
        // `slots` keeps its full allocation.
        let drained: Vec<T> = unsafe {
            let slots = &mut *self.slots.get();
            self.count.store(0, Ordering::Relaxed);
            slots.drain(..).collect()
        };
        let result = self.finish_locked(true);
        drop(drained);
        result
    }

    /// Wake waiters per the queue's notify policy
    pub fn notify(&self) -> QueueResult<()> {
        self.wake().map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Manual locking
    // ------------------------------------------------------------------

    /// Enter a critical section; the guard unlocks when dropped
    pub fn lock(&self) -> QueueResult<QueueGuard<'_, T, S>> {
        self.enter()?;
        Ok(QueueGuard {
            queue: self,
            released: false,
            _not_send: PhantomData,
        })
    }

    /// Acquire the lock and keep it past this call
    ///
    /// Pair with `unlock_raw` on the same thread. Prefer `lock()`.
    pub fn lock_raw(&self) -> QueueResult<()> {
        self.enter()
    }

    /// Release a lock taken by `lock_raw`, optionally notifying first
    pub fn unlock_raw(&self, notify: bool) -> QueueResult<()> {
        if !self.is_locked_by_current() {
            return Err(QueueError::NotLocked);
        }
        self.finish_locked(notify)
    }

    /// Store without blocking or notifying; requires `lock_raw`
    pub fn put_nolock(&self, value: T) -> Result<(), PutError<T>> {
        if !self.is_locked_by_current() {
            return Err(PutError::rejected(value, QueueError::NotLocked));
        }
        // Safety: lock held by this thread
        unsafe { self.try_push_locked(value) }
    }

    /// Take without blocking or notifying; requires `lock_raw`
    pub fn get_nolock(&self) -> QueueResult<T> {
        if !self.is_locked_by_current() {
            return Err(QueueError::NotLocked);
        }
        // Safety: lock held by this thread
        unsafe { self.pop_locked() }.ok_or(QueueError::Empty)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn enter(&self) -> QueueResult<()> {
        self.sync.lock()?;
        self.owner.store(thread_token(), Ordering::Relaxed);
        Ok(())
    }

    /// Notify per policy; under `Signal` broadcast if both kinds are blocked
    fn wake(&self) -> SyncResult<()> {
        let puts = self.waiting_puts.load(Ordering::Relaxed);
        let gets = self.waiting_gets.load(Ordering::Relaxed);
        if self.sync.policy() == NotifyPolicy::Signal && puts > 0 && gets > 0 {
            self.sync.notify_all()
        } else {
            self.sync.notify()
        }
    }

    /// Optionally notify, then unlock. Unlocks even if notify fails.
    fn finish_locked(&self, notify: bool) -> QueueResult<()> {
        let notified = if notify { self.wake() } else { Ok(()) };
        self.owner.store(0, Ordering::Relaxed);
        if let Err(e) = self.sync.unlock() {
            self.owner.store(thread_token(), Ordering::Relaxed);
            return Err(e.into());
        }
        notified.map_err(Into::into)
    }

    /// Release the lock on an error path; the original error wins
    fn bail(&self, err: QueueError) -> QueueError {
        self.owner.store(0, Ordering::Relaxed);
        if let Err(e) = self.sync.unlock() {
            kwarn!("unlock after '{}' failed: {}", err, e);
        }
        err
    }

    /// Sleep while `blocked(len)` holds, counted in `waiters`.
    /// Lock held on entry; released on error.
    fn wait_while(
        &self,
        blocked: impl Fn(usize) -> bool,
        waiters: &AtomicUsize,
        deadline: &Deadline,
    ) -> QueueResult<()> {
        let me = thread_token();
        while blocked(self.count.load(Ordering::Relaxed)) {
            self.owner.store(0, Ordering::Relaxed);
            waiters.fetch_add(1, Ordering::Relaxed);
            let status = self.sync.timed_wait(deadline);
            waiters.fetch_sub(1, Ordering::Relaxed);
            self.owner.store(me, Ordering::Relaxed);

            match status {
                Ok(WaitStatus::Notified) => {}
                Ok(WaitStatus::TimedOut) => {
                    if !blocked(self.count.load(Ordering::Relaxed)) {
                        break;
                    }
                    ktrace!("queue wait timed out (size {})", self.size());
                    // A signal may have been consumed by this expiring wait;
                    // hand it on to whoever is still blocked.
                    if self.sync.policy() == NotifyPolicy::Signal {
                        if let Err(e) = self.wake() {
                            return Err(self.bail(e.into()));
                        }
                    }
                    return Err(self.bail(QueueError::TimedOut));
                }
                Err(e) => return Err(self.bail(e.into())),
            }
        }
        Ok(())
    }

    /// # Safety
    /// Lock held by the caller and the queue not full.
    unsafe fn push_locked(&self, value: T) {
        let slots = &mut *self.slots.get();
        debug_assert!(slots.len() < self.capacity);
        slots.push(value);
        self.count.store(slots.len(), Ordering::Relaxed);
    }

    /// # Safety
    /// Lock held by the caller.
    unsafe fn try_push_locked(&self, value: T) -> Result<(), PutError<T>> {
        if self.count.load(Ordering::Relaxed) >= self.capacity {
            return Err(PutError::rejected(value, QueueError::Full));
        }
        self.push_locked(value);
        Ok(())
    }

    /// # Safety
    /// Lock held by the caller.
    unsafe fn pop_locked(&self) -> Option<T> {
        let slots = &mut *self.slots.get();
        let value = slots.pop();
        self.count.store(slots.len(), Ordering::Relaxed);
        value
    }
}

impl<T, S: SyncPrimitive> fmt::Debug for BoundedQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("size", &self.size())
            .field("capacity", &self.capacity)
            .field("policy", &self.sync.policy())
            .finish()
    }
}

/// Scoped critical section over one queue
///
/// Holding the guard means holding the queue's mutex. The non-blocking
/// operations here never notify; pass `true` to `unlock` (or call
/// `notify`) to wake waiters once for the whole batch. Dropping the guard
/// unlocks without notifying.
pub struct QueueGuard<'a, T, S: SyncPrimitive = PlatformSync> {
    queue: &'a BoundedQueue<T, S>,
    released: bool,
    // The mutex belongs to the locking thread
    _not_send: PhantomData<*const ()>,
}

impl<'a, T, S: SyncPrimitive> QueueGuard<'a, T, S> {
    /// Store without blocking; `Full` hands the value back
    pub fn put_nolock(&mut self, value: T) -> Result<(), PutError<T>> {
        // Safety: guard holds the lock
        unsafe { self.queue.try_push_locked(value) }
    }

    /// Take without blocking; `Empty` when nothing is stored
    pub fn get_nolock(&mut self) -> QueueResult<T> {
        // Safety: guard holds the lock
        unsafe { self.queue.pop_locked() }.ok_or(QueueError::Empty)
    }

    /// Exact size; nobody else can change it while the guard lives
    #[inline]
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.queue.capacity()
    }

    pub fn notify(&self) -> QueueResult<()> {
        self.queue.notify()
    }

    /// Release the lock, notifying waiters first if `notify` is set
    pub fn unlock(mut self, notify: bool) -> QueueResult<()> {
        self.released = true;
        self.queue.finish_locked(notify)
    }
}

impl<'a, T, S: SyncPrimitive> Drop for QueueGuard<'a, T, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.queue.finish_locked(false) {
            kwarn!("queue guard release failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{self, FlakySync};
    use crate::sync::CondvarSync;
    use crossbeam_queue::SegQueue;
    use qpool_core::error::SyncOp;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn queue(capacity: usize) -> BoundedQueue<usize> {
        BoundedQueue::new(capacity, NotifyPolicy::Broadcast).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = BoundedQueue::<usize>::new(0, NotifyPolicy::Broadcast).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
    }

    #[test]
    fn test_huge_capacity_is_an_error() {
        let err = BoundedQueue::<usize>::new(usize::MAX / 2, NotifyPolicy::Broadcast).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)), "unexpected {:?}", err);
    }

    #[test]
    fn test_lifo_order_and_size() {
        let q = queue(8);
        for i in 0..5 {
            q.put(i).unwrap();
        }
        assert_eq!(q.size(), 5);

        assert_eq!(q.get().unwrap(), 4);
        assert_eq!(q.get().unwrap(), 3);
        assert_eq!(q.size(), 3);

        q.put(10).unwrap();
        assert_eq!(q.get().unwrap(), 10);
        assert_eq!(q.get().unwrap(), 2);
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_capacity_flags() {
        let q = queue(2);
        assert_eq!(q.capacity(), 2);
        assert!(q.is_empty());
        q.put(1).unwrap();
        q.put(2).unwrap();
        assert!(q.is_full());
        assert!(!q.is_empty());
    }

    #[test]
    fn test_put_timeout_on_full_queue() {
        let q = queue(1);
        q.put(1).unwrap();

        let start = Instant::now();
        let err = q.put_timeout(2, 50).unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err.error(), &QueueError::TimedOut);
        assert_eq!(err.into_inner(), Some(2));
        assert!(elapsed >= Duration::from_millis(40), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
        assert_eq!(q.size(), 1);

        // Lock was released on the timeout path
        assert_eq!(q.get().unwrap(), 1);
    }

    #[test]
    fn test_get_timeout_zero_polls() {
        let q = queue(4);
        let start = Instant::now();
        assert_eq!(q.get_timeout(0), Err(QueueError::TimedOut));
        assert!(start.elapsed() < Duration::from_millis(500));

        q.put(7).unwrap();
        assert_eq!(q.get_timeout(0), Ok(7));
    }

    #[test]
    fn test_negative_timeout_blocks_until_put() {
        let q = Arc::new(queue(4));
        let q2 = Arc::clone(&q);
        let consumer = thread::spawn(move || q2.get_timeout(-1));

        thread::sleep(Duration::from_millis(80));
        assert!(!consumer.is_finished());
        q.put(42).unwrap();
        assert_eq!(consumer.join().unwrap(), Ok(42));
    }

    #[test]
    fn test_put_blocks_while_full() {
        let q = Arc::new(queue(2));
        q.put(1).unwrap();
        q.put(2).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let q = Arc::clone(&q);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                q.put(3).unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(q.size(), 2);

        assert_eq!(q.get().unwrap(), 2);
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(q.get().unwrap(), 3);
    }

    #[test]
    fn test_get_blocks_while_empty() {
        let q = Arc::new(queue(2));
        let q2 = Arc::clone(&q);
        let consumer = thread::spawn(move || q2.get().unwrap());

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());
        q.put(9).unwrap();
        assert_eq!(consumer.join().unwrap(), 9);
    }

    #[test]
    fn test_guard_batch_single_notify() {
        let q = Arc::new(queue(8));
        let received = Arc::new(SegQueue::new());

        let consumer = {
            let q = Arc::clone(&q);
            let received = Arc::clone(&received);
            thread::spawn(move || {
                for _ in 0..3 {
                    received.push(q.get().unwrap());
                }
            })
        };
        thread::sleep(Duration::from_millis(30));

        let mut guard = q.lock().unwrap();
        for i in 0..3 {
            guard.put_nolock(i).unwrap();
        }
        assert_eq!(guard.size(), 3);
        guard.unlock(true).unwrap();

        consumer.join().unwrap();
        let mut got: Vec<usize> = std::iter::from_fn(|| received.pop()).collect();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn test_guard_nolock_limits() {
        let q = queue(2);
        let mut guard = q.lock().unwrap();
        assert_eq!(guard.get_nolock(), Err(QueueError::Empty));
        guard.put_nolock(1).unwrap();
        guard.put_nolock(2).unwrap();
        assert!(guard.is_full());

        let err = guard.put_nolock(3).unwrap_err();
        assert_eq!(err.error(), &QueueError::Full);
        assert_eq!(err.into_inner(), Some(3));

        assert_eq!(guard.get_nolock(), Ok(2));
        drop(guard);

        // Dropped guard released the lock
        assert_eq!(q.get_timeout(100), Ok(1));
    }

    #[test]
    fn test_blocking_call_inside_guard_reports_deadlock() {
        let q = queue(2);
        let guard = q.lock().unwrap();
        let err = q.get_timeout(10).unwrap_err();
        match err {
            QueueError::Sync(e) => assert!(e.is_deadlock(), "unexpected {}", e),
            other => panic!("unexpected {:?}", other),
        }
        drop(guard);
        q.put(1).unwrap();
    }

    #[test]
    fn test_raw_locking() {
        let q = queue(4);
        assert_eq!(q.put_nolock(1).unwrap_err().error(), &QueueError::NotLocked);
        assert_eq!(q.get_nolock(), Err(QueueError::NotLocked));
        assert_eq!(q.unlock_raw(false), Err(QueueError::NotLocked));

        q.lock_raw().unwrap();
        assert!(q.is_locked_by_current());
        q.put_nolock(1).unwrap();
        q.put_nolock(2).unwrap();
        assert_eq!(q.get_nolock(), Ok(2));
        q.unlock_raw(true).unwrap();
        assert!(!q.is_locked_by_current());

        assert_eq!(q.size(), 1);
    }

    #[test]
    fn test_raw_nolock_from_other_thread_rejected() {
        let q = Arc::new(queue(4));
        q.lock_raw().unwrap();

        let q2 = Arc::clone(&q);
        let res = thread::spawn(move || q2.get_nolock()).join().unwrap();
        assert_eq!(res, Err(QueueError::NotLocked));

        q.unlock_raw(false).unwrap();
    }

    #[test]
    fn test_raw_batch_wakes_waiting_consumer() {
        let q = Arc::new(queue(8));
        let q2 = Arc::clone(&q);
        let consumer = thread::spawn(move || {
            (0..4).map(|_| q2.get().unwrap()).collect::<Vec<_>>()
        });
        thread::sleep(Duration::from_millis(30));

        q.lock_raw().unwrap();
        for i in 10..14 {
            q.put_nolock(i).unwrap();
        }
        q.unlock_raw(true).unwrap();

        let mut got = consumer.join().unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_clear_wakes_blocked_producer() {
        let q = Arc::new(queue(1));
        q.put(1).unwrap();

        let q2 = Arc::clone(&q);
        let producer = thread::spawn(move || q2.put(2));
        thread::sleep(Duration::from_millis(30));

        q.clear().unwrap();
        producer.join().unwrap().unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.get().unwrap(), 2);
    }

    #[test]
    fn test_clear_drops_values() {
        let marker = Arc::new(());
        let q: BoundedQueue<Arc<()>> = BoundedQueue::new(4, NotifyPolicy::Broadcast).unwrap();
        q.put(Arc::clone(&marker)).unwrap();
        q.put(Arc::clone(&marker)).unwrap();
        assert_eq!(Arc::strong_count(&marker), 3);

        q.clear().unwrap();
        assert_eq!(q.size(), 0);
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    fn mpmc_exactly_once<S: SyncPrimitive + 'static>(capacity: usize, policy: NotifyPolicy) {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 1000;

        let q: Arc<BoundedQueue<usize, S>> =
            Arc::new(BoundedQueue::with_sync(capacity, policy).unwrap());
        let seen = Arc::new(SegQueue::new());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.put(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let q = Arc::clone(&q);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    for _ in 0..PER_PRODUCER * PRODUCERS / CONSUMERS {
                        seen.push(q.get().unwrap());
                    }
                })
            })
            .collect();

        for h in producers.into_iter().chain(consumers) {
            h.join().unwrap();
        }

        let mut unique = HashSet::new();
        while let Some(v) = seen.pop() {
            assert!(unique.insert(v), "value {} seen twice", v);
        }
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn test_mpmc_exactly_once_platform() {
        mpmc_exactly_once::<PlatformSync>(8, NotifyPolicy::Broadcast);
    }

    #[test]
    fn test_mpmc_exactly_once_condvar_backend() {
        mpmc_exactly_once::<CondvarSync>(8, NotifyPolicy::Broadcast);
    }

    // One slot keeps producers and consumers blocked at the same time
    #[test]
    fn test_mpmc_signal_policy_platform() {
        mpmc_exactly_once::<PlatformSync>(1, NotifyPolicy::Signal);
    }

    #[test]
    fn test_mpmc_signal_policy_condvar_backend() {
        mpmc_exactly_once::<CondvarSync>(1, NotifyPolicy::Signal);
    }

    #[test]
    fn test_failed_notify_keeps_value_queued() {
        testing::reset(0);
        let q: BoundedQueue<usize, FlakySync> =
            BoundedQueue::with_sync(2, NotifyPolicy::Broadcast).unwrap();

        testing::fail_notify(true);
        // Stored even though the wakeup failed
        let err = q.put(5).unwrap_err();
        assert!(matches!(err.error(), QueueError::Sync(e) if e.op() == SyncOp::Notify));
        assert_eq!(err.into_inner(), None);
        assert_eq!(q.size(), 1);

        match q.get_timeout(0).unwrap_err() {
            QueueError::Sync(e) => assert_eq!(e.op(), SyncOp::Notify),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(q.size(), 1);

        testing::fail_notify(false);
        assert_eq!(q.get_timeout(0), Ok(5));
        assert!(q.is_empty());
    }

    #[test]
    fn test_spsc_with_signal_policy() {
        let q = Arc::new(BoundedQueue::<usize>::new(4, NotifyPolicy::Signal).unwrap());
        let q2 = Arc::clone(&q);
        let producer = thread::spawn(move || {
            for i in 0..500 {
                q2.put(i).unwrap();
            }
        });
        let mut sum = 0;
        for _ in 0..500 {
            sum += q.get().unwrap();
        }
        producer.join().unwrap();
        assert_eq!(sum, (0..500).sum::<usize>());
    }
}
