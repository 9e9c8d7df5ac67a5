#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::{
        Condvar, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering, fence},
    };
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};
    pub(crate) use std::sync::{Condvar, Mutex};
}

pub(crate) use imp::*;

use std::sync::{LockResult, PoisonError};

/// Recover the guard from a poisoned lock.
///
/// Lock holders in this crate never leave the protected state half-updated,
/// so a panic on another thread does not invalidate it.
pub(crate) fn unpoison<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
