//! Futures produced by suspendable coroutines.
//!
//! A [`Coro`] wraps an `async` body that returns `Result<T>`. Once started on a
//! Context, the body is polled on that Context's lane. Awaiting a pending
//! [`Future`] suspends the body; when the awaited future settles, the
//! resumption is posted back onto the same lane, never run on the thread that
//! settled it.
//!
//! # Example
//!
//! ```ignore
//! let coro = Coro::new(async move {
//!     let a = first.await?;
//!     let b = second.await?;
//!     Ok(a + b)
//! });
//! let sum = coro.start(&ctx);
//! ```
//!
//! # Abort
//!
//! [`Coro::abort`] fails the coroutine's future with
//! [`Error::CoroutineAborted`] and posts the destruction of the suspended body
//! to the coroutine's lane. Aborting the coroutine's Context has the same effect
//! at the next point where the body would have been resumed.

use crate::error::{Error, Result, panic_message};
use crate::future::{Future, Promise};
use crate::runtime::{Context, Schedule, make_waker};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future as StdFuture;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context as TaskContext, Poll};

/// Handle to a coroutine producing a `Future<T>`.
///
/// Dropping the handle after [`start`](Self::start) does not stop the
/// coroutine; use [`abort`](Self::abort) for that.
pub struct Coro<T> {
    task: Arc<CoroTask<T>>,
}

struct CoroTask<T> {
    frame: Mutex<Option<BoxFuture<'static, Result<T>>>>,
    promise: Promise<T>,
    ctx: OnceLock<Arc<dyn Context>>,
    aborted: AtomicBool,
}

impl<T: Send + Sync + 'static> Coro<T> {
    /// Wraps `body` without running it.
    pub fn new<F>(body: F) -> Self
    where
        F: StdFuture<Output = Result<T>> + Send + 'static,
    {
        Self {
            task: Arc::new(CoroTask {
                frame: Mutex::new(Some(Box::pin(body))),
                promise: Promise::new(),
                ctx: OnceLock::new(),
                aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Creates and starts a coroutine in one go.
    pub fn spawn<F>(ctx: &Arc<dyn Context>, body: F) -> Self
    where
        F: StdFuture<Output = Result<T>> + Send + 'static,
    {
        let coro = Self::new(body);
        coro.start(ctx);
        coro
    }

    /// Binds the coroutine to `ctx` and posts its first poll to `ctx`'s lane.
    ///
    /// Only the first call has an effect; later calls just return the future.
    pub fn start(&self, ctx: &Arc<dyn Context>) -> Future<T> {
        if self.task.ctx.set(ctx.clone()).is_ok() {
            self.task.schedule();
        }
        self.task.promise.future()
    }

    pub fn future(&self) -> Future<T> {
        self.task.promise.future()
    }

    /// Fails the future and destroys the suspended body on its lane.
    pub fn abort(&self) {
        self.task.promise.reject(Error::CoroutineAborted);
        self.task.aborted.store(true, Ordering::Release);

        if self.task.ctx.get().is_some() {
            self.task.schedule();
        } else {
            // Never started, so there is no lane to hand the body to.
            let body = self.task.frame.lock().take();
            drop(body);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.task.aborted.load(Ordering::Acquire)
    }
}

impl<T: Send + Sync + 'static> CoroTask<T> {
    /// Polls the body once; runs on the coroutine's lane.
    fn resume(self: &Arc<Self>) {
        let mut frame = self.frame.lock();

        let ctx_aborted = self.ctx.get().is_some_and(|ctx| ctx.aborted());
        if self.aborted.load(Ordering::Acquire) || ctx_aborted {
            self.promise.reject(Error::CoroutineAborted);
            let body = frame.take();
            drop(frame);
            drop(body);
            return;
        }

        let Some(body) = frame.as_mut() else {
            return;
        };

        let waker = make_waker(self.clone());
        let mut cx = TaskContext::from_waker(&waker);

        let outcome = match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => return,
            Ok(Poll::Ready(outcome)) => outcome,
            Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
        };

        let body = frame.take();
        drop(frame);
        drop(body);
        self.promise.settle(outcome);
    }
}

impl<T: Send + Sync + 'static> Schedule for CoroTask<T> {
    fn schedule(self: &Arc<Self>) {
        let Some(ctx) = self.ctx.get() else {
            return;
        };

        let task = self.clone();
        let env = ctx.env().clone();
        env.exec(ctx.lane(), ctx.clone(), move || task.resume());
    }
}
