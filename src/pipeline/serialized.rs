//! Mutual exclusion around a non-thread-safe shared resource (the notification channel).

use anyhow::Result;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// At most one [`invoke`](SerializedResource::invoke) runs at a time, and none after release.
/// Lock order across callers is whoever gets there first; there is no FIFO fairness.
pub struct SerializedResource<R> {
    inner: Mutex<R>,
    released: AtomicBool,
}

impl<R> SerializedResource<R> {
    pub fn new(resource: R) -> Self {
        SerializedResource {
            inner: Mutex::new(resource),
            released: AtomicBool::new(false),
        }
    }

    /// Run `action` with exclusive access. The lock is released on every exit path,
    /// including a panic inside `action`; the action's result is returned as-is.
    /// Returns `None` without running `action` once the resource has been released.
    pub fn invoke<T, E>(
        &self,
        action: impl FnOnce(&mut R) -> Result<T, E>,
    ) -> Option<Result<T, E>> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_released() {
            return None;
        }
        Some(action(&mut guard))
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Mark released, then run `release` under the lock. With `wait == false` and the lock
    /// held elsewhere, `release` is not run and `Ok(false)` is returned; the resource still
    /// refuses every later invocation.
    fn shut<F>(&self, release: F, wait: bool) -> Result<bool>
    where
        F: FnOnce(&mut R) -> Result<()>,
    {
        self.released.store(true, Ordering::SeqCst);
        let mut guard = if wait {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        } else {
            match self.inner.try_lock() {
                Ok(g) => g,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => return Ok(false),
            }
        };
        release(&mut guard).map(|()| true)
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

type ReleaseFn<R> = Box<dyn FnOnce(&mut R) -> Result<()> + Send>;

/// Releases a [`SerializedResource`] at most once: explicitly via [`release`](Self::release)
/// or [`release_if_idle`](Self::release_if_idle), or on drop if the owner bailed out early.
pub struct ReleaseGuard<R> {
    resource: Arc<SerializedResource<R>>,
    release: Option<ReleaseFn<R>>,
}

impl<R> ReleaseGuard<R> {
    pub fn new<F>(resource: Arc<SerializedResource<R>>, release: F) -> Self
    where
        F: FnOnce(&mut R) -> Result<()> + Send + 'static,
    {
        ReleaseGuard {
            resource,
            release: Some(Box::new(release)),
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Release now, waiting for any in-flight invocation. Later calls (and the drop) are no-ops.
    pub fn release(&mut self) -> Result<()> {
        match self.release.take() {
            Some(f) => self.resource.shut(f, true).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Release without waiting. If an invocation is still holding the lock (a stuck call),
    /// the release action is dropped unrun and `Ok(false)` is returned. Either way the
    /// resource accepts no further invocations.
    pub fn release_if_idle(&mut self) -> Result<bool> {
        match self.release.take() {
            Some(f) => self.resource.shut(f, false),
            None => Ok(true),
        }
    }
}

impl<R> Drop for ReleaseGuard<R> {
    fn drop(&mut self) {
        if self.release.is_some() {
            debug!("releasing shared resource on early exit");
            if let Err(e) = self.release() {
                warn!("release failed: {:#}", e);
            }
        }
    }
}
