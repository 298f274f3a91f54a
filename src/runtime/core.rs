//! The four-lane environment every job is submitted to.
//!
//! [`Env`] owns the lane worker threads; [`EnvHandle`] is the cheap, cloneable
//! handle that Contexts keep and that every `exec*` call goes through. Dropping
//! the `Env` stops the lanes, joins their workers and drops whatever is still
//! queued.

use crate::builder::EnvBuilder;
use crate::config::{EnvConfig, MainLane};
use crate::error::{Error, Result};
use crate::runtime::context::{Context, ContextId};
use crate::runtime::driver;
use crate::runtime::lane::{Job, Lane, LaneQueue};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Owner of the lane workers.
///
/// Dereferences to its [`EnvHandle`], so `exec*` can be called on it directly.
///
/// # Example
/// ```ignore
/// let env = Env::builder().async_workers(2).build()?;
/// let ctx: Arc<dyn Context> = GenericContext::new(&env, FileId(1), "demo");
/// env.exec_async(ctx, || println!("on the pool"));
/// ```
pub struct Env {
    handle: EnvHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable handle to an [`Env`]; all `exec*` methods are thread-safe.
#[derive(Clone)]
pub struct EnvHandle {
    inner: Arc<EnvInner>,
}

struct EnvInner {
    lanes: [Arc<LaneQueue>; 4],
    contexts: Mutex<HashMap<ContextId, Weak<dyn Context>>>,
    config: EnvConfig,
    exit: AtomicBool,
}

impl Env {
    pub fn builder() -> EnvBuilder {
        EnvBuilder::new()
    }

    /// Starts the lane workers described by `config`.
    pub(crate) fn start(config: EnvConfig) -> Result<Self> {
        let lanes = Lane::ALL.map(|lane| Arc::new(LaneQueue::new(lane)));
        let handle = EnvHandle {
            inner: Arc::new(EnvInner {
                lanes,
                contexts: Mutex::new(HashMap::new()),
                config,
                exit: AtomicBool::new(false),
            }),
        };

        let mut env = Env {
            handle,
            workers: Vec::new(),
        };

        for lane in Lane::ALL {
            let count = match lane {
                Lane::Main if env.handle.config().main_lane == MainLane::Hosted => 0,
                Lane::Async => env.handle.config().async_workers.max(1),
                _ => 1,
            };
            // On failure `env` is dropped here, which stops the workers
            // already started.
            let workers = driver::spawn_workers(env.handle.lane(lane), count)?;
            env.workers.extend(workers);
        }

        log::debug!(
            "env started with {} workers (root {})",
            env.workers.len(),
            env.handle.root().display()
        );
        Ok(env)
    }

    pub fn handle(&self) -> &EnvHandle {
        &self.handle
    }
}

impl Deref for Env {
    type Target = EnvHandle;

    fn deref(&self) -> &EnvHandle {
        &self.handle
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        for lane in &self.handle.inner.lanes {
            lane.shutdown();
        }

        let current = std::thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }

        // Jobs hold Contexts, which hold this Env's handle: dropping them
        // breaks that cycle.
        for lane in &self.handle.inner.lanes {
            lane.drain();
        }
        log::debug!("env stopped");
    }
}

impl EnvHandle {
    fn lane(&self, lane: Lane) -> &Arc<LaneQueue> {
        &self.inner.lanes[lane.index()]
    }

    /// Enqueues `task` on `lane` to run as soon as possible.
    pub fn exec<F>(&self, lane: Lane, ctx: Arc<dyn Context>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(lane, ctx, Box::new(task), None);
    }

    /// Enqueues `task` on `lane` to run no earlier than `time`.
    pub fn exec_at<F>(&self, lane: Lane, ctx: Arc<dyn Context>, task: F, time: Instant)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(lane, ctx, Box::new(task), Some(time));
    }

    pub fn exec_main<F>(&self, ctx: Arc<dyn Context>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.exec(Lane::Main, ctx, task);
    }

    pub fn exec_sub<F>(&self, ctx: Arc<dyn Context>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.exec(Lane::Sub, ctx, task);
    }

    pub fn exec_async<F>(&self, ctx: Arc<dyn Context>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.exec(Lane::Async, ctx, task);
    }

    pub fn exec_gl<F>(&self, ctx: Arc<dyn Context>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.exec(Lane::Gl, ctx, task);
    }

    fn push(
        &self,
        lane: Lane,
        ctx: Arc<dyn Context>,
        task: Box<dyn FnOnce() + Send>,
        time: Option<Instant>,
    ) {
        self.lane(lane).push(Job { ctx, task }, time);
    }

    /// Runs every Main task that is due, on the calling thread.
    ///
    /// Only meaningful with a hosted Main lane; returns 0 otherwise.
    pub fn pump_main(&self) -> usize {
        if self.config().main_lane != MainLane::Hosted {
            log::warn!("pump_main called while the main lane has its own worker");
            return 0;
        }
        self.lane(Lane::Main).run_ready()
    }

    /// Number of jobs queued on `lane`, due or not.
    pub fn queued(&self, lane: Lane) -> usize {
        self.lane(lane).len()
    }

    /// Total number of panics caught at lane boundaries.
    pub fn panics(&self) -> usize {
        self.inner.lanes.iter().map(|lane| lane.panics()).sum()
    }

    pub(crate) fn add_context(&self, id: ContextId, ctx: Weak<dyn Context>) {
        self.inner.contexts.lock().insert(id, ctx);
    }

    pub(crate) fn remove_context(&self, id: ContextId) {
        self.inner.contexts.lock().remove(&id);
    }

    /// Snapshot of every live Context registered with this Env.
    pub fn contexts(&self) -> Vec<Arc<dyn Context>> {
        let contexts = self.inner.contexts.lock();
        contexts.values().filter_map(Weak::upgrade).collect()
    }

    pub fn context_count(&self) -> usize {
        self.inner.contexts.lock().len()
    }

    /// Logs an error surfaced by a consumer of this Env.
    pub fn report(&self, err: &Error) {
        log::error!("{err}");
    }

    /// Asks the host to shut the application down.
    pub fn request_exit(&self) {
        self.inner.exit.store(true, Ordering::Release);
    }

    pub fn exit_requested(&self) -> bool {
        self.inner.exit.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.inner.config
    }

    /// Filesystem root the Env was built with.
    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    /// Time budget a serialized worker runs before reposting itself.
    pub fn thread_slice(&self) -> Duration {
        Duration::from_micros(self.inner.config.thread_slice_us)
    }
}
