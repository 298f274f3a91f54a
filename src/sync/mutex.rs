//! Payload-free advisory mutex.
//!
//! [`Mutex`] queues shared and exclusive requests exactly like
//! [`Resource`](crate::Resource) does; a granted [`MutexLock`] only proves
//! ownership. Lock/unlock notifications are plain closures.
//!
//! ```ignore
//! let mutex = Mutex::with_callbacks(|| log::debug!("busy"), || log::debug!("idle"));
//! mutex.acquire_lock(&ctx, true).then_ok(&ctx, |_lock| {
//!     write_cache();
//! });
//! ```

use crate::error::{Error, Result};
use crate::future::Future;
use crate::runtime::Context;
use crate::sync::arbiter::{Arbiter, Grant, LockHooks, Release};

use std::fmt;
use std::sync::Arc;

type Callback = Box<dyn Fn() + Send + Sync>;

/// Advisory mutex with shared and exclusive acquisition.
///
/// Same queueing rules as [`Resource`](crate::Resource), without a payload and
/// with plain closures instead of a hooks object.
pub struct Mutex {
    arbiter: Arc<Arbiter<MutexLock>>,
}

/// A granted [`Mutex`] lock; released when the last clone is dropped.
pub struct MutexLock {
    release: Release<MutexLock>,
}

impl Grant for MutexLock {
    type Shared = ();

    fn grant(release: Release<Self>, _: &()) -> Self {
        Self { release }
    }
}

struct Callbacks {
    on_lock: Callback,
    on_unlock: Callback,
}

impl LockHooks for Callbacks {
    fn on_lock(&self) {
        (self.on_lock)();
    }

    fn on_unlock(&self) {
        (self.on_unlock)();
    }
}

impl Mutex {
    pub fn new() -> Self {
        Self::with_callbacks(|| {}, || {})
    }

    /// `on_lock` runs when the mutex leaves the free state, `on_unlock` when
    /// it returns to it. The pair is only ordered for transitions made on one
    /// sequential lane; see [`LockHooks`](crate::LockHooks).
    pub fn with_callbacks<L, U>(on_lock: L, on_unlock: U) -> Self
    where
        L: Fn() + Send + Sync + 'static,
        U: Fn() + Send + Sync + 'static,
    {
        let callbacks = Callbacks {
            on_lock: Box::new(on_lock),
            on_unlock: Box::new(on_unlock),
        };
        Self {
            arbiter: Arbiter::new((), Box::new(callbacks)),
        }
    }

    pub fn acquire_lock(&self, ctx: &Arc<dyn Context>, exclusive: bool) -> Future<Arc<MutexLock>> {
        self.arbiter.acquire(ctx, exclusive)
    }

    pub fn try_acquire_lock(&self, ctx: &Arc<dyn Context>, exclusive: bool) -> Option<Arc<MutexLock>> {
        self.arbiter.try_acquire(ctx, exclusive)
    }

    pub fn is_locked(&self) -> bool {
        self.arbiter.is_locked()
    }

    pub fn pending(&self) -> usize {
        self.arbiter.pending()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        self.arbiter.close();
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .field("pending", &self.pending())
            .finish()
    }
}

impl MutexLock {
    /// Fails with [`Error::LockExpired`] once the mutex is gone.
    pub fn check(&self) -> Result<()> {
        self.release.arbiter().map(drop).ok_or(Error::LockExpired)
    }

    pub fn is_exclusive(&self) -> bool {
        self.release.exclusive()
    }
}

impl fmt::Debug for MutexLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexLock")
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}
