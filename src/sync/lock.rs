//! Advisory reader/writer lock paired with a payload.
//!
//! [`Resource<T>`] guards a value of type `T`; callers that opt in acquire it
//! shared or exclusive and read the payload through the granted [`Lock<T>`].
//! Nothing stops code from ignoring the lock; it only serializes the callers
//! that use it.
//!
//! # Example
//!
//! ```ignore
//! let texture = Resource::new(TextureId(7));
//! texture.acquire(&ctx, true).then_ok(&ctx, |lock| {
//!     if let Ok(id) = lock.get() {
//!         upload(*id);
//!     }
//! });
//! ```

use crate::error::{Error, Result};
use crate::future::Future;
use crate::runtime::Context;
use crate::sync::arbiter::{Arbiter, Grant, LockHooks, NoHooks, Release};

use std::fmt;
use std::sync::{Arc, Weak};

/// A payload acquirable exclusively or shared.
///
/// Dropping the resource rejects every queued request with
/// [`Error::LockCancelled`]; locks already granted turn into
/// [`Error::LockExpired`] on use.
pub struct Resource<T: Send + Sync + 'static = ()> {
    arbiter: Arc<Arbiter<Lock<T>>>,
    payload: Arc<T>,
}

/// A granted lock on a [`Resource`].
///
/// Shared holders receive clones of the same `Arc<Lock<T>>`; the lock is
/// released when the last clone is dropped. The release runs on the lane of
/// the Context that acquired it.
pub struct Lock<T: Send + Sync + 'static> {
    release: Release<Lock<T>>,
    payload: Weak<T>,
}

impl<T: Send + Sync + 'static> Grant for Lock<T> {
    type Shared = Weak<T>;

    fn grant(release: Release<Self>, payload: &Weak<T>) -> Self {
        Self {
            release,
            payload: payload.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Resource<T> {
    pub fn new(payload: T) -> Self {
        Self::with_hooks(payload, NoHooks)
    }

    /// Creates a resource that reports Free/Held transitions to `hooks`.
    pub fn with_hooks(payload: T, hooks: impl LockHooks) -> Self {
        let payload = Arc::new(payload);
        Self {
            arbiter: Arbiter::new(Arc::downgrade(&payload), Box::new(hooks)),
            payload,
        }
    }

    /// Requests the lock; resolves once it is granted.
    pub fn acquire(&self, ctx: &Arc<dyn Context>, exclusive: bool) -> Future<Arc<Lock<T>>> {
        self.arbiter.acquire(ctx, exclusive)
    }

    /// Grants the lock only if that is possible without waiting.
    pub fn try_acquire(&self, ctx: &Arc<dyn Context>, exclusive: bool) -> Option<Arc<Lock<T>>> {
        self.arbiter.try_acquire(ctx, exclusive)
    }

    pub fn is_locked(&self) -> bool {
        self.arbiter.is_locked()
    }

    /// Number of queued requests.
    pub fn pending(&self) -> usize {
        self.arbiter.pending()
    }
}

impl Default for Resource<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<T: Send + Sync + 'static> Drop for Resource<T> {
    fn drop(&mut self) {
        self.arbiter.close();
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("locked", &self.is_locked())
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Lock<T> {
    /// Fails with [`Error::LockExpired`] once the resource is gone.
    pub fn check(&self) -> Result<()> {
        self.release.arbiter().map(drop).ok_or(Error::LockExpired)
    }

    /// The guarded payload.
    pub fn get(&self) -> Result<Arc<T>> {
        self.check()?;
        self.payload.upgrade().ok_or(Error::LockExpired)
    }

    pub fn is_exclusive(&self) -> bool {
        self.release.exclusive()
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Lock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("exclusive", &self.is_exclusive())
            .field("expired", &self.check().is_err())
            .finish()
    }
}
