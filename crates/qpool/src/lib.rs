//! # qpool - Pool of Bounded Blocking Handle Queues
//!
//! Fixed-size pool of thread-safe, fixed-capacity queues for handing
//! pointer-sized handles (sockets, buffers, tokens) from producer threads
//! to consumer threads.
//!
//! ## Features
//!
//! - **Blocking**: `put` waits while full, `get` waits while empty
//! - **Timed**: millisecond timeouts on a monotonic clock (`-1` blocks, `0` polls)
//! - **Batching**: lock once, `put_nolock`/`get_nolock` many, notify once
//! - **Native**: error-checking pthread mutex + condvar on unix, std primitives elsewhere
//!
//! Values come out **LIFO**: `get` returns the most recently stored value.
//!
//! ## Quick Start
//!
//! ```ignore
//! use qpool::{pool_init, pool_at, pool_close, RawHandle};
//!
//! pool_init(4)?;
//!
//! let q = pool_at(0)?;
//! std::thread::spawn(|| {
//!     let h = pool_at(0).unwrap().get().unwrap();
//!     println!("got {:?}", h);
//! });
//! q.put(RawHandle::from_usize(42))?;
//!
//! // Batch under one lock, wake consumers once
//! let mut guard = q.lock()?;
//! guard.put_nolock(RawHandle::from_usize(1))?;
//! guard.put_nolock(RawHandle::from_usize(2))?;
//! guard.unlock(true)?;
//!
//! pool_close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  pool_init / pool_at / pool_close           │
//! │            process-wide Arc<QueuePool<RawHandle>>           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ index
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Queue 0  │      │  Queue 1  │      │  Queue N  │
//!    │ LIFO slots│      │ LIFO slots│      │ LIFO slots│
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │     SyncPrimitive: mutex + condvar (one per queue)      │
//!    │        PthreadSync (unix) / CondvarSync (portable)      │
//!    └─────────────────────────────────────────────────────────┘
//! ```

pub mod global;

// Re-export core types
pub use qpool_core::{
    ConfigError,
    PutError,
    QueueError,
    QueueResult,
    RawHandle,
    SyncError,
    SyncOp,
    SyncResult,
};

// Re-export kprint macros for debug logging
pub use qpool_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use qpool_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use qpool_core::{env_get, env_get_bool, env_get_str};

// Re-export runtime types
pub use qpool_runtime::{
    BoundedQueue,
    ClockSource,
    CondvarSync,
    Deadline,
    NotifyPolicy,
    PlatformSync,
    PoolConfig,
    QueueGuard,
    QueuePool,
    SyncPrimitive,
    Timeout,
    WaitStatus,
};

pub use global::{pool_at, pool_close, pool_init, pool_init_with, pool_size, QueueHandle};
