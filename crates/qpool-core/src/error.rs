//! Error types for qpool queues

use core::fmt;

use crate::constants::STATUS_FAILURE;

/// Result type for queue and pool operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for raw mutex/condvar operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in queue and pool operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Argument outside its contract (zero capacity, non-positive pool size)
    InvalidArgument(&'static str),

    /// Queue index outside the pool
    OutOfRange { index: i64, len: usize },

    /// `_nolock` call from a thread that does not hold the queue lock
    NotLocked,

    /// Queue is full (non-blocking put)
    Full,

    /// Queue is empty (non-blocking get)
    Empty,

    /// Timed operation expired before the queue changed state
    TimedOut,

    /// Underlying mutex/condvar operation failed
    Sync(SyncError),
}

impl QueueError {
    /// Integer status for embedders that speak errno-style codes.
    ///
    /// OS failures keep their code, timeouts map to `ETIMEDOUT`, everything
    /// else is `-1`.
    pub fn code(&self) -> i32 {
        match self {
            QueueError::Sync(e) => e.code(),
            QueueError::TimedOut => libc::ETIMEDOUT,
            _ => STATUS_FAILURE,
        }
    }

    /// True for the outcomes a caller is expected to retry on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Full | QueueError::Empty | QueueError::TimedOut)
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            QueueError::OutOfRange { index, len } => {
                write!(f, "index {} out of range (pool has {} queues)", index, len)
            }
            QueueError::NotLocked => write!(f, "queue lock not held by calling thread"),
            QueueError::Full => write!(f, "queue full"),
            QueueError::Empty => write!(f, "queue empty"),
            QueueError::TimedOut => write!(f, "operation timed out"),
            QueueError::Sync(e) => write!(f, "sync error: {}", e),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for QueueError {
    fn from(e: SyncError) -> Self {
        QueueError::Sync(e)
    }
}

/// Raw synchronization operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Init,
    Lock,
    Unlock,
    Wait,
    TimedWait,
    Notify,
    Clock,
    Destroy,
}

impl SyncOp {
    pub fn name(&self) -> &'static str {
        match self {
            SyncOp::Init => "init",
            SyncOp::Lock => "lock",
            SyncOp::Unlock => "unlock",
            SyncOp::Wait => "wait",
            SyncOp::TimedWait => "timed_wait",
            SyncOp::Notify => "notify",
            SyncOp::Clock => "clock",
            SyncOp::Destroy => "destroy",
        }
    }
}

/// OS-level failure of a mutex/condvar operation
///
/// The code is passed through verbatim from the native primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncError {
    op: SyncOp,
    code: i32,
}

impl SyncError {
    pub const fn new(op: SyncOp, code: i32) -> Self {
        Self { op, code }
    }

    #[inline]
    pub fn op(&self) -> SyncOp {
        self.op
    }

    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Relock attempted by the thread that already owns the mutex
    pub fn is_deadlock(&self) -> bool {
        self.code == libc::EDEADLK
    }

    /// Unlock or wait attempted by a thread that does not own the mutex
    pub fn is_not_owner(&self) -> bool {
        self.code == libc::EPERM
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {} (code {})",
            self.op.name(),
            std::io::Error::from_raw_os_error(self.code),
            self.code
        )
    }
}

impl std::error::Error for SyncError {}

/// Error returned by put operations
///
/// Carries the value back when it was not enqueued. A synchronization
/// failure after the value was stored (notify or unlock) carries no value.
#[derive(Clone, PartialEq, Eq)]
pub struct PutError<T> {
    value: Option<T>,
    error: QueueError,
}

impl<T> PutError<T> {
    /// The value was not enqueued
    pub fn rejected(value: T, error: QueueError) -> Self {
        Self { value: Some(value), error }
    }

    /// The value is in the queue but the operation still failed
    pub fn after_enqueue(error: QueueError) -> Self {
        Self { value: None, error }
    }

    /// The failure reason
    pub fn error(&self) -> &QueueError {
        &self.error
    }

    /// Recover the value if it was not enqueued
    pub fn into_inner(self) -> Option<T> {
        self.value
    }

    pub fn into_parts(self) -> (Option<T>, QueueError) {
        (self.value, self.error)
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError")
            .field("error", &self.error)
            .field("enqueued", &self.value.is_none())
            .finish()
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "put failed: {}", self.error)
    }
}

impl<T> std::error::Error for PutError<T> {}

impl<T> From<PutError<T>> for QueueError {
    fn from(e: PutError<T>) -> Self {
        e.error
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for QueueError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => QueueError::InvalidArgument(msg),
        }
    }
}
