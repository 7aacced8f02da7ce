//! A value shared across threads behind a single lock.
//!
//! [`AtomicValue`] is for small pieces of state that live outside a store
//! (caches, flags, the last snapshot a UI drew) and are touched from several
//! threads. Every read and write goes through the same lock, so a read always
//! sees the latest completed write.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-protected value.
///
/// A writer that panics while holding the lock does not poison the value for
/// everyone else; the last written state stays readable.
#[derive(Default)]
pub struct AtomicValue<T> {
    value: RwLock<T>,
}

impl<T> AtomicValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        *self.write() = value;
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.write(), value)
    }

    /// Mutate in place. Other readers and writers wait until `f` returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write())
    }

    /// Read through a borrow, without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read())
    }

    pub fn into_inner(self) -> T {
        self.value
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> AtomicValue<T> {
    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.read().clone()
    }
}

impl<T> From<T> for AtomicValue<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for AtomicValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicValue")
            .field("value", &*self.read())
            .finish()
    }
}
