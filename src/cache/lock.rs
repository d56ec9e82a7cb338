//! Poison-recovering lock helpers. A panicked holder leaves the protected
//! data in whatever state it reached; for caches and test clocks that is
//! still usable, so recover and log instead of propagating the panic.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "rwlock.read", "recovered from poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "rwlock.write", "recovered from poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn mutex_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, lock_kind = "mutex.lock", "recovered from poisoned lock");
            poisoned.into_inner()
        }
    }
}
