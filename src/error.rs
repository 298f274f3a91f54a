//! Error type shared by every primitive in the crate.
//!
//! Futures carry errors opaquely: they store whatever the producer rejected with
//! and hand it to whichever continuation inspects it. The variants below are the
//! ones the crate itself produces, plus [`Error::User`] and [`Error::Message`]
//! for domain errors raised by callers.

use crate::runtime::Lane;

use std::any::Any;
use std::sync::Arc;

/// Result alias that carries the crate [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for futures, locks and lanes.
///
/// Cloneable so that one settled future can hand the same error to any number
/// of readers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Every [`Promise`](crate::Promise) was dropped while the future was pending.
    #[error("promise abandoned before it was settled")]
    Abandoned,

    /// A domain error raised by a producer.
    #[error("{0}")]
    User(Arc<dyn std::error::Error + Send + Sync>),

    /// A plain message raised by a producer.
    #[error("{0}")]
    Message(String),

    /// The lock was destroyed while the request was still queued.
    #[error("lock cancelled")]
    LockCancelled,

    /// The lock handle outlived the resource it was granted on.
    #[error("lock expired")]
    LockExpired,

    /// The coroutine producing the future was aborted.
    #[error("coroutine aborted")]
    CoroutineAborted,

    /// The value was read before the future settled.
    #[error("future is still pending")]
    Pending,

    /// A producer panicked while computing the value.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A lane worker thread could not be started.
    #[error("failed to spawn {lane} lane worker: {source}")]
    Spawn {
        lane: Lane,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl Error {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps a domain error so it can travel through a future.
    pub fn user<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::User(Arc::new(err))
    }

    /// Returns the wrapped domain error if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::User(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
