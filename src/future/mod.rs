//! Single-assignment async result cells.
//!
//! A [`Promise`] is the writer half and a [`Future`] the reader half of one
//! shared cell. The cell moves from pending to done or error exactly once; any
//! later attempt to settle it is ignored.
//!
//! # How to use
//!
//! 1. Create a `Promise<T>`.
//! 2. Hand `promise.future()` to whoever wants the `T`.
//! 3. Call [`Promise::resolve`] or [`Promise::reject`] to finish it.
//!
//! Readers wait with [`Future::then`], [`Future::then_ok`], [`Future::catch`],
//! [`Future::chain`], or by `.await`ing the future inside a [`Coro`].
//!
//! ```ignore
//! let promise = Promise::new();
//! promise.future().then_ok(&ctx, |v: &i32| println!("got {v}"));
//! promise.resolve(42);
//! ```
//!
//! # Abandonment
//!
//! Promises are counted. When the last one is dropped while the cell is still
//! pending, the cell settles to [`Error::Abandoned`], so nobody waits forever on
//! a producer that went away.

pub mod aggregate;
pub mod coro;

pub use aggregate::AggregatePromise;
pub use coro::Coro;

use crate::error::{Error, Result, panic_message};
use crate::runtime::Context;

use parking_lot::Mutex;
use std::fmt;
use std::future::Future as StdFuture;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context as TaskContext, Poll, Waker};

/// Where a [`Future`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Done,
    Error,
}

type Callback<T> = Box<dyn FnOnce(&Future<T>) + Send>;

struct Shared<T> {
    outcome: OnceLock<Result<T>>,
    waiters: Mutex<Waiters<T>>,
    promises: AtomicUsize,
    observed: AtomicBool,
}

struct Waiters<T> {
    callbacks: Vec<Callback<T>>,
    wakers: Vec<Waker>,
}

impl<T> Shared<T> {
    fn new(outcome: OnceLock<Result<T>>, promises: usize) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            waiters: Mutex::new(Waiters {
                callbacks: Vec::new(),
                wakers: Vec::new(),
            }),
            promises: AtomicUsize::new(promises),
            observed: AtomicBool::new(false),
        })
    }

    fn observe(&self) {
        self.observed.store(true, Ordering::Relaxed);
    }
}

/// Moves the cell out of pending. Returns false if it had already settled.
///
/// Callbacks and wakers are taken out under the lock and invoked after it is
/// released.
fn settle<T>(shared: &Arc<Shared<T>>, outcome: Result<T>) -> bool {
    let (callbacks, wakers) = {
        let mut waiters = shared.waiters.lock();
        if shared.outcome.set(outcome).is_err() {
            return false;
        }
        (
            std::mem::take(&mut waiters.callbacks),
            std::mem::take(&mut waiters.wakers),
        )
    };

    let future = Future {
        shared: shared.clone(),
    };
    for callback in callbacks {
        callback(&future);
    }
    for waker in wakers {
        waker.wake();
    }
    true
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.outcome.get()
            && !*self.observed.get_mut()
        {
            match err {
                Error::Abandoned => log::debug!("future dropped unobserved: {err}"),
                _ => log::warn!("future dropped with an unobserved error: {err}"),
            }
        }
    }
}

/// Writer half of a future. Cloning adds another writer.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        Self {
            shared: Shared::new(OnceLock::new(), 1),
        }
    }

    /// Creates a reader for this promise.
    pub fn future(&self) -> Future<T> {
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Settles with `value`; ignored if already settled.
    pub fn resolve(&self, value: T) {
        settle(&self.shared, Ok(value));
    }

    /// Settles with `err`; ignored if already settled.
    pub fn reject(&self, err: impl Into<Error>) {
        settle(&self.shared, Err(err.into()));
    }

    pub fn settle(&self, outcome: Result<T>) {
        settle(&self.shared, outcome);
    }

    /// Settles with the result of `f`, turning a panic into [`Error::Panicked`].
    pub fn wrap<F>(&self, f: F)
    where
        F: FnOnce() -> Result<T>,
    {
        let outcome = catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))));
        self.settle(outcome);
    }

    pub fn is_pending(&self) -> bool {
        self.shared.outcome.get().is_none()
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        self.shared.promises.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.shared.promises.fetch_sub(1, Ordering::AcqRel) == 1
            && self.shared.outcome.get().is_none()
        {
            settle(&self.shared, Err(Error::Abandoned));
        }
    }
}

/// Reader half of a single-assignment cell.
///
/// Awaiting a `Future<T>` (for `T: Clone`) yields `Result<T>`.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Future<T> {
    /// A future that is already done.
    pub fn ready(value: T) -> Self {
        Self {
            shared: Shared::new(OnceLock::from(Ok(value)), 0),
        }
    }

    /// A future that has already failed.
    pub fn failed(err: impl Into<Error>) -> Self {
        Self {
            shared: Shared::new(OnceLock::from(Err(err.into())), 0),
        }
    }

    pub fn state(&self) -> State {
        match self.shared.outcome.get() {
            None => State::Pending,
            Some(Ok(_)) => State::Done,
            Some(Err(_)) => State::Error,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_done(&self) -> bool {
        self.state() == State::Done
    }

    pub fn is_error(&self) -> bool {
        self.state() == State::Error
    }

    /// The settled value, the settled error, or [`Error::Pending`].
    pub fn value(&self) -> Result<&T> {
        match self.outcome() {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(err.clone()),
            None => Err(Error::Pending),
        }
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome()?.err()
    }

    /// `None` while pending.
    pub fn outcome(&self) -> Option<std::result::Result<&T, &Error>> {
        let outcome = self.shared.outcome.get()?;
        self.shared.observe();
        Some(outcome.as_ref())
    }

    /// Runs `callback` when the cell settles, or right away if it already has.
    ///
    /// Runs inline on whichever thread settles the cell.
    fn subscribe(&self, callback: Callback<T>) {
        self.shared.observe();
        {
            let mut waiters = self.shared.waiters.lock();
            if self.shared.outcome.get().is_none() {
                waiters.callbacks.push(callback);
                return;
            }
        }
        callback(self);
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    /// Schedules `f` on `ctx`'s lane once the future settles.
    ///
    /// `f` is always posted to the lane, even if the future has already
    /// settled; it never runs inside this call.
    pub fn then<F>(&self, ctx: &Arc<dyn Context>, f: F) -> &Self
    where
        F: FnOnce(&Future<T>) + Send + 'static,
    {
        let ctx = ctx.clone();
        self.subscribe(Box::new(move |future: &Future<T>| {
            let future = future.clone();
            let env = ctx.env().clone();
            let lane = ctx.lane();
            env.exec(lane, ctx, move || f(&future));
        }));
        self
    }

    /// Like [`then`](Self::then), but only called with the value on success.
    pub fn then_ok<F>(&self, ctx: &Arc<dyn Context>, f: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.then(ctx, move |future| {
            if let Some(Ok(value)) = future.outcome() {
                f(value);
            }
        })
    }

    /// Like [`then`](Self::then), but only called with the error on failure.
    pub fn catch<F>(&self, ctx: &Arc<dyn Context>, f: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.then(ctx, move |future| {
            if let Some(Err(err)) = future.outcome() {
                f(err);
            }
        })
    }

    /// Pipes the value through `transform` into `target`; errors are
    /// forwarded to `target` untouched.
    pub fn chain<U, F>(&self, ctx: &Arc<dyn Context>, target: Promise<U>, transform: F) -> &Self
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U> + Send + 'static,
    {
        self.then(ctx, move |future| match future.outcome() {
            Some(Ok(value)) => target.settle(transform(value)),
            Some(Err(err)) => target.reject(err.clone()),
            None => {}
        })
    }

    /// Returns a new future holding `transform` applied to this one's value.
    pub fn map<U, F>(&self, ctx: &Arc<dyn Context>, transform: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U> + Send + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();
        self.chain(ctx, promise, transform);
        future
    }

    /// Runs `f` inline as soon as the future settles.
    pub(crate) fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(std::result::Result<&T, &Error>) + Send + 'static,
    {
        self.subscribe(Box::new(move |future: &Future<T>| {
            if let Some(outcome) = future.outcome() {
                f(outcome);
            }
        }));
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Clone> StdFuture for Future<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Result<T>> {
        let shared = &self.shared;

        if let Some(outcome) = shared.outcome.get() {
            shared.observe();
            return Poll::Ready(outcome.clone());
        }

        let mut waiters = shared.waiters.lock();
        // Settled between the check above and taking the lock.
        if let Some(outcome) = shared.outcome.get() {
            drop(waiters);
            shared.observe();
            return Poll::Ready(outcome.clone());
        }
        if !waiters.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            waiters.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
