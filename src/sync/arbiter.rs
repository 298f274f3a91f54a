//! Queueing state machine shared by [`Resource`](super::Resource) and
//! [`Mutex`](super::Mutex).
//!
//! `Free -> Held(exclusive | shared) -> Free`. Requests that cannot be granted
//! wait in arrival order; a shared request never overtakes a queued exclusive
//! one. Grants are reference-counted handles whose drop posts the release onto
//! the acquiring Context's lane.

use crate::error::Error;
use crate::future::{Future, Promise};
use crate::runtime::Context;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Callbacks fired when a lock leaves or returns to the free state.
///
/// Hooks run after the lock's internal state has been released, on whichever
/// thread made the transition. Transitions made on different threads may
/// therefore report out of order: an `on_lock` for a new holder can run before
/// the `on_unlock` of the previous one. Transitions driven from a single
/// sequential lane are reported in order.
pub trait LockHooks: Send + Sync + 'static {
    /// Free -> Held.
    fn on_lock(&self) {}
    /// Held -> Free.
    fn on_unlock(&self) {}
}

pub(crate) struct NoHooks;

impl LockHooks for NoHooks {}

/// A handle type the arbiter hands out.
pub(crate) trait Grant: Send + Sync + Sized + 'static {
    /// Data the arbiter keeps for building grants.
    type Shared: Send + Sync + 'static;

    fn grant(release: Release<Self>, shared: &Self::Shared) -> Self;
}

pub(crate) struct Arbiter<G: Grant> {
    state: Mutex<State<G>>,
    shared: G::Shared,
    hooks: Box<dyn LockHooks>,
}

struct State<G> {
    held: Option<Held<G>>,
    pending: VecDeque<Waiting<G>>,
    closed: bool,
}

struct Held<G> {
    exclusive: bool,
    grant: Weak<G>,
}

struct Waiting<G> {
    exclusive: bool,
    ctx: Arc<dyn Context>,
    promise: Promise<Arc<G>>,
}

impl<G: Grant> Arbiter<G> {
    pub(crate) fn new(shared: G::Shared, hooks: Box<dyn LockHooks>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                held: None,
                pending: VecDeque::new(),
                closed: false,
            }),
            shared,
            hooks,
        })
    }

    /// Grants right away when possible, otherwise queues the request.
    pub(crate) fn acquire(self: &Arc<Self>, ctx: &Arc<dyn Context>, exclusive: bool) -> Future<Arc<G>> {
        let mut state = self.state.lock();

        if state.closed {
            return Future::failed(Error::LockCancelled);
        }
        if let Some((grant, fresh)) = self.try_grant(&mut state, ctx, exclusive) {
            drop(state);
            if fresh {
                self.hooks.on_lock();
            }
            return Future::ready(grant);
        }

        // Consecutive shared requests are served together.
        if !exclusive
            && let Some(last) = state.pending.back()
            && !last.exclusive
        {
            return last.promise.future();
        }

        let promise = Promise::new();
        let future = promise.future();
        state.pending.push_back(Waiting {
            exclusive,
            ctx: ctx.clone(),
            promise,
        });
        future
    }

    pub(crate) fn try_acquire(self: &Arc<Self>, ctx: &Arc<dyn Context>, exclusive: bool) -> Option<Arc<G>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        let (grant, fresh) = self.try_grant(&mut state, ctx, exclusive)?;
        drop(state);
        if fresh {
            self.hooks.on_lock();
        }
        Some(grant)
    }

    /// Returns the grant and whether the lock just left the free state.
    fn try_grant(
        self: &Arc<Self>,
        state: &mut State<G>,
        ctx: &Arc<dyn Context>,
        exclusive: bool,
    ) -> Option<(Arc<G>, bool)> {
        if let Some(held) = &state.held {
            if held.exclusive || exclusive || !state.pending.is_empty() {
                return None;
            }
            // A dead grant means its release is already on the way.
            return held.grant.upgrade().map(|grant| (grant, false));
        }
        Some((self.hold(state, ctx.clone(), exclusive), true))
    }

    fn hold(self: &Arc<Self>, state: &mut State<G>, ctx: Arc<dyn Context>, exclusive: bool) -> Arc<G> {
        let release = Release {
            arbiter: Arc::downgrade(self),
            ctx,
            exclusive,
        };
        let grant = Arc::new(G::grant(release, &self.shared));
        state.held = Some(Held {
            exclusive,
            grant: Arc::downgrade(&grant),
        });
        grant
    }

    /// Hands the lock to the longest-waiting request, or frees it.
    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.held = None;
        if state.closed {
            return;
        }

        match state.pending.pop_front() {
            Some(next) => {
                let grant = self.hold(&mut state, next.ctx, next.exclusive);
                drop(state);
                next.promise.resolve(grant);
            }
            None => {
                drop(state);
                self.hooks.on_unlock();
            }
        }
    }

    /// Rejects every queued request; used when the lock itself goes away.
    pub(crate) fn close(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };

        if !pending.is_empty() {
            log::warn!("lock destroyed with {} queued requests", pending.len());
        }
        for waiting in pending {
            waiting.promise.reject(Error::LockCancelled);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.state.lock().held.is_some()
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

/// Back-reference from a grant to its arbiter.
///
/// Dropping it posts the release onto the acquiring Context's lane instead of
/// running it on whichever thread dropped the grant.
pub(crate) struct Release<G: Grant> {
    arbiter: Weak<Arbiter<G>>,
    ctx: Arc<dyn Context>,
    exclusive: bool,
}

impl<G: Grant> Release<G> {
    /// The arbiter, unless the lock has been destroyed.
    pub(crate) fn arbiter(&self) -> Option<Arc<Arbiter<G>>> {
        self.arbiter.upgrade().filter(|arbiter| !arbiter.is_closed())
    }

    pub(crate) fn exclusive(&self) -> bool {
        self.exclusive
    }
}

impl<G: Grant> Drop for Release<G> {
    fn drop(&mut self) {
        let arbiter = self.arbiter.clone();
        if arbiter.strong_count() == 0 {
            return;
        }

        let env = self.ctx.env().clone();
        env.exec(self.ctx.lane(), self.ctx.clone(), move || {
            if let Some(arbiter) = arbiter.upgrade() {
                arbiter.release();
            }
        });
    }
}
