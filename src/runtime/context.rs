//! Contexts: the identity and cancellation unit every job is submitted with.
//!
//! A [`Context`] names who asked for a piece of work (its initiator), which
//! Context spawned it (its parent chain, kept for diagnostics) and on which
//! [`Lane`] continuations registered on its behalf should run. Aborting a
//! Context only raises a flag; task bodies poll [`Context::aborted`] and stop on
//! their own.
//!
//! Every Context is registered with its [`Env`](crate::Env) when it is created
//! and removed again when the last `Arc` to it is dropped.
//!
//! # Example
//!
//! ```ignore
//! let env = Env::builder().build()?;
//! let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "evaluate node");
//! env.exec_sub(ctx.clone(), || println!("hello from the sub lane"));
//! ```

use crate::runtime::core::EnvHandle;
use crate::runtime::lane::Lane;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Process-unique identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the file (node) that initiated an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId(pub u64);

/// State shared by every [`Context`] implementation.
///
/// Dropping it deregisters the Context from its Env.
pub struct ContextBase {
    id: ContextId,
    env: EnvHandle,
    initiator: FileId,
    parent: Option<Weak<dyn Context>>,
    depth: usize,
}

impl ContextBase {
    pub fn new(env: &EnvHandle, initiator: FileId, parent: Option<&Arc<dyn Context>>) -> Self {
        Self {
            id: ContextId::next(),
            env: env.clone(),
            initiator,
            parent: parent.map(Arc::downgrade),
            depth: parent.map_or(0, |p| p.depth() + 1),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn env(&self) -> &EnvHandle {
        &self.env
    }
}

impl Drop for ContextBase {
    fn drop(&mut self) {
        self.env.remove_context(self.id);
    }
}

/// A cancellable, attributable unit of work.
pub trait Context: Send + Sync {
    /// Identity and bookkeeping shared by all implementations.
    fn base(&self) -> &ContextBase;

    /// Requests cooperative cancellation. Never preempts running work.
    fn abort(&self) {}

    fn aborted(&self) -> bool {
        false
    }

    fn memory_usage(&self) -> usize {
        0
    }

    fn description(&self) -> String {
        String::new()
    }

    /// Lane that continuations, resumptions and lock releases run on.
    fn lane(&self) -> Lane {
        Lane::Sub
    }

    fn id(&self) -> ContextId {
        self.base().id
    }

    fn env(&self) -> &EnvHandle {
        &self.base().env
    }

    fn initiator(&self) -> FileId {
        self.base().initiator
    }

    /// The Context this one was derived from, if it is still alive.
    fn parent(&self) -> Option<Arc<dyn Context>> {
        self.base().parent.as_ref().and_then(Weak::upgrade)
    }

    /// Number of ancestors in the parent chain.
    fn depth(&self) -> usize {
        self.base().depth
    }
}

impl fmt::Debug for dyn Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("initiator", &self.initiator())
            .field("depth", &self.depth())
            .field("description", &self.description())
            .finish()
    }
}

/// Registers a freshly created Context with its Env and returns it.
///
/// Every constructor of a [`Context`] implementation should pass the new
/// `Arc` through here so the Context shows up in
/// [`EnvHandle::contexts`]; it is removed again when its [`ContextBase`] drops.
///
/// ```ignore
/// struct Import { base: ContextBase }
///
/// impl Context for Import {
///     fn base(&self) -> &ContextBase { &self.base }
/// }
///
/// let ctx = register(Arc::new(Import { base: ContextBase::new(&env, FileId(5), None) }));
/// ```
pub fn register<C: Context + 'static>(ctx: Arc<C>) -> Arc<C> {
    let weak: Weak<dyn Context> = Arc::downgrade(&ctx) as Weak<dyn Context>;
    ctx.env().add_context(ctx.id(), weak);
    ctx
}

/// General purpose [`Context`] with a description, memory figure and lane.
pub struct GenericContext {
    base: ContextBase,
    description: Mutex<String>,
    memory: AtomicUsize,
    lane: AtomicU8,
    abort: AtomicBool,
}

impl GenericContext {
    pub fn new(env: &EnvHandle, initiator: FileId, description: impl Into<String>) -> Arc<Self> {
        Self::build(ContextBase::new(env, initiator, None), description.into())
    }

    /// Derives a Context from `parent`, inheriting its initiator and lane.
    pub fn child(parent: &Arc<dyn Context>, description: impl Into<String>) -> Arc<Self> {
        let base = ContextBase::new(parent.env(), parent.initiator(), Some(parent));
        let ctx = Self::build(base, description.into());
        ctx.set_lane(parent.lane());
        ctx
    }

    fn build(base: ContextBase, description: String) -> Arc<Self> {
        register(Arc::new(Self {
            base,
            description: Mutex::new(description),
            memory: AtomicUsize::new(0),
            lane: AtomicU8::new(Lane::Sub.index() as u8),
            abort: AtomicBool::new(false),
        }))
    }

    pub fn set_lane(&self, lane: Lane) {
        self.lane.store(lane.index() as u8, Ordering::Release);
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self.description.lock() = description.into();
    }

    pub fn set_memory_usage(&self, bytes: usize) {
        self.memory.store(bytes, Ordering::Relaxed);
    }
}

impl Context for GenericContext {
    fn base(&self) -> &ContextBase {
        &self.base
    }

    fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn memory_usage(&self) -> usize {
        self.memory.load(Ordering::Relaxed)
    }

    fn description(&self) -> String {
        self.description.lock().clone()
    }

    fn lane(&self) -> Lane {
        Lane::from_index(self.lane.load(Ordering::Acquire))
    }
}

/// Keeps weak track of the Contexts it creates and aborts them together.
///
/// Dropping the owner aborts everything it still tracks.
#[derive(Default)]
pub struct ContextOwner {
    contexts: Vec<Weak<dyn Context>>,
}

impl ContextOwner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `ctx` and hands it back.
    pub fn track<C: Context + 'static>(&mut self, ctx: Arc<C>) -> Arc<C> {
        self.contexts.retain(|weak| weak.strong_count() > 0);
        self.contexts.push(Arc::downgrade(&ctx) as Weak<dyn Context>);
        ctx
    }

    pub fn abort_all(&self) {
        for ctx in self.contexts.iter().filter_map(Weak::upgrade) {
            ctx.abort();
        }
    }

    /// Number of tracked Contexts that are still alive.
    pub fn live(&self) -> usize {
        self.contexts.iter().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl Drop for ContextOwner {
    fn drop(&mut self) {
        self.abort_all();
    }
}
