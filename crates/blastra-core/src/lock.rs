//! Poison-recovering wrappers around std lock acquisition.
//!
//! A panic while holding a guard poisons the lock; the guarded state is
//! a cache or registry that tolerates staleness, so recover the guard
//! and keep serving instead of propagating the panic.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub fn rw_read<'a, T>(lock: &'a RwLock<T>, target: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target_module = target, lock_kind = "rwlock.read", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub fn rw_write<'a, T>(lock: &'a RwLock<T>, target: &'static str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target_module = target, lock_kind = "rwlock.write", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}

pub fn mutex_lock<'a, T>(lock: &'a Mutex<T>, target: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target_module = target, lock_kind = "mutex.lock", "recovered poisoned lock");
            poisoned.into_inner()
        }
    }
}
