//! Fan-in barrier over a dynamic set of futures.
//!
//! Futures may be added at any time, including while earlier ones are
//! settling. The barrier holds one extra ticket for as long as it is still
//! being filled, so it cannot complete before the caller has added everything;
//! the ticket is released by [`AggregatePromise::seal`] or by dropping the
//! barrier.
//!
//! ```ignore
//! let all = AggregatePromise::new();
//! for input in inputs {
//!     all.add(&input);
//! }
//! let done = all.seal();
//! ```

use crate::future::{Future, Promise};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolves once every added future succeeds, or on the first error.
pub struct AggregatePromise {
    shared: Arc<Shared>,
}

struct Shared {
    remaining: AtomicUsize,
    promise: Promise<()>,
}

impl Shared {
    fn release(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.promise.resolve(());
        }
    }
}

impl AggregatePromise {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                remaining: AtomicUsize::new(1),
                promise: Promise::new(),
            }),
        }
    }

    /// Tracks `future`; its error, if any, becomes the composite's error.
    pub fn add<T: Send + Sync + 'static>(&self, future: &Future<T>) -> &Self {
        self.shared.remaining.fetch_add(1, Ordering::AcqRel);

        let shared = self.shared.clone();
        future.on_settled(move |outcome| match outcome {
            Ok(_) => shared.release(),
            Err(err) => shared.promise.reject(err.clone()),
        });
        self
    }

    /// The composite future; it stays pending until the barrier is sealed.
    pub fn future(&self) -> Future<()> {
        self.shared.promise.future()
    }

    /// Stops accepting futures and returns the composite.
    pub fn seal(self) -> Future<()> {
        self.future()
    }
}

impl Default for AggregatePromise {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AggregatePromise {
    fn drop(&mut self) {
        self.shared.release();
    }
}
