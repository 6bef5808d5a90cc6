//! Opaque pointer-sized payload
//!
//! Queues are generic over their slot type; `RawHandle` is the slot type
//! used by the process-wide pool, carrying socket handles or any other
//! pointer-sized token between threads. The library never dereferences it.

use core::ffi::c_void;
use core::fmt;
use core::mem::size_of;

use crate::error::{QueueError, QueueResult};

/// Pointer-sized opaque value
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(usize);

// Safety: the handle is never dereferenced here; whatever it points at is
// the embedder's business.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// Null handle
    pub const NULL: RawHandle = RawHandle(0);

    /// Size of the packed byte form
    pub const SIZE: usize = size_of::<usize>();

    #[inline]
    pub const fn from_usize(v: usize) -> Self {
        RawHandle(v)
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        RawHandle(ptr as usize)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn from_ne_bytes(bytes: [u8; size_of::<usize>()]) -> Self {
        RawHandle(usize::from_ne_bytes(bytes))
    }

    #[inline]
    pub const fn to_ne_bytes(self) -> [u8; size_of::<usize>()] {
        self.0.to_ne_bytes()
    }

    /// Decode a pointer packed into a byte string
    ///
    /// The slice must be exactly pointer-sized.
    pub fn try_from_bytes(bytes: &[u8]) -> QueueResult<Self> {
        let arr: [u8; size_of::<usize>()] = bytes
            .try_into()
            .map_err(|_| QueueError::InvalidArgument("packed handle must be pointer-sized"))?;
        Ok(Self::from_ne_bytes(arr))
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.0)
    }
}

impl From<usize> for RawHandle {
    fn from(v: usize) -> Self {
        RawHandle(v)
    }
}

impl From<RawHandle> for usize {
    fn from(h: RawHandle) -> Self {
        h.0
    }
}
