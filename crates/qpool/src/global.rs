//! Process-wide queue pool
//!
//! One pool of `RawHandle` queues per process, addressed by index from any
//! thread. Init and close are serialized by `POOL`'s own lock, which is
//! never held while a queue operation runs.
//!
//! `pool_at` hands out a `QueueHandle` that keeps the pool alive, so
//! `pool_close` never destroys a queue another thread is still blocked on:
//! the queues go away when the last handle is dropped.

use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use qpool_core::error::{QueueError, QueueResult};
use qpool_core::handle::RawHandle;
use qpool_core::{kdebug, kinfo};
use qpool_runtime::{BoundedQueue, PoolConfig, QueuePool};

type HandlePool = QueuePool<RawHandle>;

static POOL: RwLock<Option<Arc<HandlePool>>> = RwLock::new(None);

fn current() -> Option<Arc<HandlePool>> {
    POOL.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Create the process-wide pool with `count` queues.
///
/// Queue settings come from `PoolConfig::from_env()`. Calling this again
/// while a pool exists does nothing and succeeds; the existing pool keeps
/// its size.
pub fn pool_init(count: i64) -> QueueResult<()> {
    pool_init_with(count, &PoolConfig::from_env())
}

/// As `pool_init`, with explicit queue settings
pub fn pool_init_with(count: i64, config: &PoolConfig) -> QueueResult<()> {
    if count <= 0 {
        return Err(QueueError::InvalidArgument("pool size must be > 0"));
    }
    let count = usize::try_from(count)
        .map_err(|_| QueueError::InvalidArgument("pool size exceeds address space"))?;

    let mut slot = POOL.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = slot.as_ref() {
        kdebug!("pool_init({}) ignored: pool already has {} queues", count, pool.len());
        return Ok(());
    }
    *slot = Some(Arc::new(QueuePool::new(count, config)?));
    Ok(())
}

/// Queue at `index` in the process-wide pool
///
/// Negative indices and indices past the end are `OutOfRange`. Before
/// `pool_init` (or after `pool_close`) the pool behaves as empty.
pub fn pool_at(index: i64) -> QueueResult<QueueHandle> {
    let pool = current();
    let len = pool.as_ref().map_or(0, |p| p.len());
    let out_of_range = QueueError::OutOfRange { index, len };

    let pool = pool.ok_or(out_of_range.clone())?;
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(QueueHandle { pool, index: i }),
        _ => Err(out_of_range),
    }
}

/// Number of queues in the process-wide pool; 0 when closed
pub fn pool_size() -> usize {
    current().map_or(0, |p| p.len())
}

/// Tear down the process-wide pool.
///
/// Safe to call more than once. Queues still referenced by a `QueueHandle`
/// are destroyed when the last handle is dropped.
pub fn pool_close() -> QueueResult<()> {
    let taken = POOL.write().unwrap_or_else(PoisonError::into_inner).take();
    let Some(pool) = taken else {
        return Ok(());
    };
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.close(),
        Err(shared) => kinfo!(
            "pool closed; {} queue handles still outstanding",
            Arc::strong_count(&shared) - 1
        ),
    }
    Ok(())
}

/// A queue of the process-wide pool
///
/// Dereferences to the queue. Cloning is cheap and keeps the same queue.
#[derive(Clone)]
pub struct QueueHandle {
    pool: Arc<HandlePool>,
    index: usize,
}

impl QueueHandle {
    /// Position of this queue in the pool
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for QueueHandle {
    type Target = BoundedQueue<RawHandle>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pool[self.index]
    }
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("index", &self.index)
            .field("queue", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    // Every test here shares the one process-wide pool
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn small() -> PoolConfig {
        PoolConfig::new().queue_capacity(4)
    }

    #[test]
    fn test_init_is_idempotent() {
        let _g = serial();
        pool_close().unwrap();

        pool_init_with(4, &small()).unwrap();
        pool_init_with(8, &small()).unwrap();
        assert_eq!(pool_size(), 4);
        assert!(pool_at(3).is_ok());
        assert_eq!(
            pool_at(5).unwrap_err(),
            QueueError::OutOfRange { index: 5, len: 4 }
        );

        pool_close().unwrap();
    }

    #[test]
    fn test_init_rejects_non_positive() {
        let _g = serial();
        pool_close().unwrap();

        assert!(matches!(pool_init(0), Err(QueueError::InvalidArgument(_))));
        assert!(matches!(pool_init(-3), Err(QueueError::InvalidArgument(_))));
        assert_eq!(pool_size(), 0);
    }

    #[test]
    fn test_negative_index() {
        let _g = serial();
        pool_close().unwrap();
        pool_init_with(2, &small()).unwrap();

        assert_eq!(
            pool_at(-1).unwrap_err(),
            QueueError::OutOfRange { index: -1, len: 2 }
        );
        pool_close().unwrap();
    }

    #[test]
    fn test_close_then_at_fails() {
        let _g = serial();
        pool_close().unwrap();
        pool_init_with(2, &small()).unwrap();
        pool_close().unwrap();

        assert_eq!(
            pool_at(0).unwrap_err(),
            QueueError::OutOfRange { index: 0, len: 0 }
        );
        assert_eq!(pool_size(), 0);
        // Second close is a no-op
        pool_close().unwrap();
    }

    #[test]
    fn test_handle_roundtrip_between_threads() {
        let _g = serial();
        pool_close().unwrap();
        pool_init_with(2, &small()).unwrap();

        let consumer = thread::spawn(|| pool_at(1).unwrap().get().unwrap());
        thread::sleep(Duration::from_millis(20));

        let h = RawHandle::from_usize(0xdead_beef);
        pool_at(1).unwrap().put(h).unwrap();
        assert_eq!(consumer.join().unwrap(), h);

        pool_close().unwrap();
    }

    #[test]
    fn test_outstanding_handle_survives_close() {
        let _g = serial();
        pool_close().unwrap();
        pool_init_with(1, &small()).unwrap();

        let q = pool_at(0).unwrap();
        q.put(RawHandle::from_usize(7)).unwrap();
        pool_close().unwrap();

        // The queue lives until the handle is dropped
        assert_eq!(q.get_timeout(0).unwrap().as_usize(), 7);
        assert_eq!(pool_size(), 0);
    }

    #[test]
    fn test_reinit_after_close() {
        let _g = serial();
        pool_close().unwrap();
        pool_init_with(2, &small()).unwrap();
        pool_close().unwrap();

        pool_init_with(3, &small()).unwrap();
        assert_eq!(pool_size(), 3);
        assert_eq!(pool_at(2).unwrap().capacity(), 4);
        pool_close().unwrap();
    }
}
