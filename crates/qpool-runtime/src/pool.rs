//! Fixed-size pool of bounded queues addressed by index
//!
//! All queues share one `PoolConfig`. The pool never grows or shrinks;
//! dropping it destroys every queue (and every value still stored).

use core::fmt;

use qpool_core::error::{QueueError, QueueResult};
use qpool_core::{kdebug, kerror, kinfo};

use crate::config::PoolConfig;
use crate::queue::BoundedQueue;
use crate::sync::{PlatformSync, SyncPrimitive};

/// `n` independent queues built from one configuration
pub struct QueuePool<T, S: SyncPrimitive = PlatformSync> {
    queues: Box<[BoundedQueue<T, S>]>,
    config: PoolConfig,
}

impl<T> QueuePool<T> {
    /// Pool on the platform's native primitive
    pub fn new(count: usize, config: &PoolConfig) -> QueueResult<Self> {
        Self::with_sync(count, config)
    }
}

impl<T, S: SyncPrimitive> QueuePool<T, S> {
    /// Pool on an explicit primitive type.
    ///
    /// If any queue fails to build, the ones already built are destroyed
    /// before the error is returned.
    pub fn with_sync(count: usize, config: &PoolConfig) -> QueueResult<Self> {
        if count == 0 {
            return Err(QueueError::InvalidArgument("pool needs at least one queue"));
        }
        config.validate()?;

        let mut queues = Vec::with_capacity(count);
        for index in 0..count {
            match BoundedQueue::with_sync(config.queue_capacity, config.notify_policy) {
                Ok(q) => queues.push(q),
                Err(e) => {
                    kerror!("queue {} of {} failed to init: {}; unwinding", index, count, e);
                    return Err(e);
                }
            }
        }

        kinfo!(
            "pool ready: {} queues x {} slots, {} notify",
            count,
            config.queue_capacity,
            config.notify_policy.name()
        );
        Ok(Self {
            queues: queues.into_boxed_slice(),
            config: config.clone(),
        })
    }

    /// Queue at `index`
    pub fn at(&self, index: usize) -> QueueResult<&BoundedQueue<T, S>> {
        self.queues.get(index).ok_or(QueueError::OutOfRange {
            index: index as i64,
            len: self.queues.len(),
        })
    }

    /// Number of queues
    #[inline]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Always false: a pool holds at least one queue
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Slots per queue
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.queue_capacity
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn iter(&self) -> core::slice::Iter<'_, BoundedQueue<T, S>> {
        self.queues.iter()
    }

    /// Values stored across every queue (unlocked snapshot)
    pub fn total_size(&self) -> usize {
        self.queues.iter().map(BoundedQueue::size).sum()
    }

    /// Destroy every queue, logging what was still stored
    pub fn close(self) {
        let stranded = self.total_size();
        if stranded > 0 {
            kdebug!("closing pool with {} values still queued", stranded);
        }
        kinfo!("pool closed ({} queues)", self.queues.len());
    }
}

/// Panics on an out-of-range index, like slice indexing; `at` is the
/// checked form.
impl<T, S: SyncPrimitive> core::ops::Index<usize> for QueuePool<T, S> {
    type Output = BoundedQueue<T, S>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.queues[index]
    }
}

impl<'a, T, S: SyncPrimitive> IntoIterator for &'a QueuePool<T, S> {
    type Item = &'a BoundedQueue<T, S>;
    type IntoIter = core::slice::Iter<'a, BoundedQueue<T, S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, S: SyncPrimitive> fmt::Debug for QueuePool<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuePool")
            .field("len", &self.queues.len())
            .field("config", &self.config)
            .finish()
    }
}
