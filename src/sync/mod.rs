//! Advisory lock primitives whose acquisition is reported through [`Future`](crate::Future).

mod arbiter;
pub mod lock;
pub mod mutex;

pub use arbiter::LockHooks;
pub use lock::{Lock, Resource};
pub use mutex::{Mutex, MutexLock};
