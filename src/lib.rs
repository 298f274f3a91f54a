//! Lane-scheduled futures, coroutines and advisory locks.
//!
//! Work is submitted to an [`Env`], which runs four lanes: `Main` (UI loop),
//! `Sub` (sequential continuations), `Async` (worker pool) and `Gl` (dedicated
//! graphics lane). Every job is submitted on behalf of a [`Context`], which
//! names who asked for it and which lane its continuations come back on.
//!
//! # Architecture
//!
//! - **Env / EnvHandle**: owns the lane workers; `exec*` enqueue jobs
//! - **Context**: identity, lane and cooperative cancellation of a job
//! - **Future / Promise**: single-assignment result cell with lane-posted continuations
//! - **Coro**: `async` body resumed on its Context's lane, producing a `Future`
//! - **AggregatePromise**: fan-in over a dynamic set of futures
//! - **Resource / Mutex**: advisory shared/exclusive locks granted through futures
//! - **Thread**: serialized worker emulated on top of a lane
//! - **TimedQueue**: time-ordered heap backing lanes and serialized workers
//! - **EnvBuilder / EnvConfig**: construction and configuration

mod builder;
mod config;
mod error;
mod future;
mod runtime;
mod sync;
mod thread;
mod timer;

pub use builder::EnvBuilder;
pub use config::{EnvConfig, MainLane};
pub use error::{Error, Result};
pub use future::{AggregatePromise, Coro, Future, Promise, State};
pub use runtime::yield_now::{YieldNow, yield_now};
pub use runtime::{
    Context, ContextBase, ContextId, ContextOwner, Env, EnvHandle, FileId, GenericContext, Lane,
    TimedQueue, register,
};
pub use sync::{Lock, LockHooks, Mutex, MutexLock, Resource};
pub use thread::{Runner, Thread};
pub use timer::{sleep, sleep_until};
