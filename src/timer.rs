//! Timer futures.
//!
//! A sleep is a timed post onto the Context's lane that resolves a promise; no
//! timer thread is involved. If the Env shuts down first, the post is dropped
//! and the future fails with [`Error::Abandoned`](crate::Error::Abandoned).

use crate::future::{Future, Promise};
use crate::runtime::Context;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resolves after `duration` has elapsed.
///
/// # Example
/// ```ignore
/// Coro::spawn(&ctx, async move {
///     sleep(&ctx2, Duration::from_millis(100)).await?;
///     Ok(())
/// });
/// ```
pub fn sleep(ctx: &Arc<dyn Context>, duration: Duration) -> Future<()> {
    sleep_until(ctx, Instant::now() + duration)
}

/// Resolves once `deadline` is reached.
pub fn sleep_until(ctx: &Arc<dyn Context>, deadline: Instant) -> Future<()> {
    let promise = Promise::new();
    let future = promise.future();

    ctx.env()
        .exec_at(ctx.lane(), ctx.clone(), move || promise.resolve(()), deadline);
    future
}
