//! # qpool-core
//!
//! Core types for the qpool handle queues.
//!
//! This crate is platform-agnostic and contains no synchronization code.
//! The mutex/condvar backends, the queue and the pool live in
//! `qpool-runtime`.
//!
//! ## Modules
//!
//! - `error` - Queue and synchronization error types
//! - `handle` - Opaque pointer-sized payload
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod error;
pub mod handle;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use error::{ConfigError, PutError, QueueError, QueueResult, SyncError, SyncOp, SyncResult};
pub use handle::RawHandle;
pub use env::{env_get, env_get_bool, env_get_str};

/// Constants shared by the runtime and the facade
pub mod constants {
    /// Status code reported for failures that carry no OS error code
    pub const STATUS_FAILURE: i32 = -1;
}
