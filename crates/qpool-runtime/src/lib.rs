//! # qpool-runtime
//!
//! Platform-specific half of qpool.
//!
//! This crate provides:
//! - Monotonic clock reads and absolute deadlines (`clock`)
//! - The mutex + condvar capability and its backends (`sync`)
//! - The bounded blocking queue with guard and raw locking (`queue`)
//! - The fixed-size queue pool (`pool`)
//! - Compile-time + environment configuration (`config`)

pub mod config;
pub mod clock;
pub mod sync;
pub mod queue;
pub mod pool;

// Re-exports
pub use config::PoolConfig;
pub use clock::{ClockSource, Deadline, Timeout, Timespec};
pub use sync::{CondvarSync, NotifyPolicy, PlatformSync, SyncPrimitive, WaitStatus};
pub use queue::{BoundedQueue, QueueGuard};
pub use pool::QueuePool;

#[cfg(all(unix, not(feature = "portable-sync")))]
pub use sync::PthreadSync;
