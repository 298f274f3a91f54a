//! Lane scheduling subsystem.

pub(crate) mod context;
pub(crate) mod core;
pub(crate) mod driver;
pub(crate) mod lane;
pub(crate) mod queue;
pub(crate) mod waker;
pub mod yield_now;

pub use context::{Context, ContextBase, ContextId, ContextOwner, FileId, GenericContext, register};
pub use self::core::{Env, EnvHandle};
pub use lane::Lane;
pub use queue::TimedQueue;
pub(crate) use waker::{Schedule, make_waker};
