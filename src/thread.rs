//! Serialized worker running on top of a lane.
//!
//! A [`Thread`] behaves like a dedicated single-threaded worker: tasks pushed
//! to it run one at a time, in `(time, push order)`, on a single [`Runner`].
//! It owns no OS thread. Instead it keeps one trampoline job in flight on its
//! lane; the trampoline runs whatever is due for up to the Env's thread slice,
//! then reposts itself for the next due task, or stops when the queue is empty.
//!
//! # Example
//!
//! ```ignore
//! let worker = Thread::new(&env, FileId(3), Lane::Async, |path: PathBuf| load(path));
//! worker.push(ctx.clone(), "a.png".into());
//! worker.push_at(ctx, "b.png".into(), Instant::now() + Duration::from_millis(5));
//! ```

use crate::error::panic_message;
use crate::runtime::{Context, ContextBase, EnvHandle, FileId, Lane, TimedQueue, register};

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// The code a [`Thread`] runs its tasks with.
///
/// Any `FnMut(T)` closure is a runner.
pub trait Runner<T>: Send + 'static {
    fn run(&mut self, task: T);

    /// Called when a trampoline finds nothing due.
    fn idle(&mut self) {}
}

impl<T, F> Runner<T> for F
where
    F: FnMut(T) + Send + 'static,
{
    fn run(&mut self, task: T) {
        self(task)
    }
}

pub struct Thread<R, T> {
    base: ContextBase,
    me: Weak<Self>,
    runner: Mutex<R>,
    inner: Mutex<Inner<T>>,
    lane: AtomicU8,
    abort: AtomicBool,
    done: AtomicUsize,
}

struct Inner<T> {
    queue: TimedQueue<Queued<T>>,
    state: Trampoline,
    // Bumped for every posted trampoline; a trampoline whose epoch is stale
    // returns without doing anything.
    epoch: u64,
}

struct Queued<T> {
    ctx: Arc<dyn Context>,
    task: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trampoline {
    Idle,
    Scheduled { at: Instant, epoch: u64 },
    Running,
}

impl<T> Inner<T> {
    /// Moves to `Scheduled` for the earliest queued task, if any.
    fn schedule_next(&mut self) -> Option<(Instant, u64)> {
        let at = self.queue.next_time()?;
        self.epoch += 1;
        self.state = Trampoline::Scheduled {
            at,
            epoch: self.epoch,
        };
        Some((at, self.epoch))
    }
}

impl<R, T> Thread<R, T>
where
    R: Runner<T>,
    T: Send + 'static,
{
    pub fn new(env: &EnvHandle, initiator: FileId, lane: Lane, runner: R) -> Arc<Self> {
        let thread = Arc::new_cyclic(|me| Self {
            base: ContextBase::new(env, initiator, None),
            me: me.clone(),
            runner: Mutex::new(runner),
            inner: Mutex::new(Inner {
                queue: TimedQueue::new(),
                state: Trampoline::Idle,
                epoch: 0,
            }),
            lane: AtomicU8::new(lane.index() as u8),
            abort: AtomicBool::new(false),
            done: AtomicUsize::new(0),
        });
        register(thread)
    }

    /// Queues `task` to run as soon as the worker gets to it.
    pub fn push(&self, ctx: Arc<dyn Context>, task: T) {
        self.enqueue(ctx, task, None);
    }

    /// Queues `task` to run no earlier than `time`.
    pub fn push_at(&self, ctx: Arc<dyn Context>, task: T, time: Instant) {
        self.enqueue(ctx, task, Some(time));
    }

    fn enqueue(&self, ctx: Arc<dyn Context>, task: T, time: Option<Instant>) {
        if self.aborted() {
            log::debug!("thread #{} is aborted, dropping task", self.id());
            return;
        }

        let post = {
            let mut inner = self.inner.lock();
            // "now" is read under the lock so one producer's tasks keep their order.
            let time = time.unwrap_or_else(Instant::now);
            inner.queue.push(time, Queued { ctx, task });

            match inner.state {
                Trampoline::Running => None,
                Trampoline::Scheduled { at, .. } if at <= time => None,
                _ => inner.schedule_next(),
            }
        };

        if let Some((at, epoch)) = post {
            self.post(at, epoch);
        }
    }

    fn post(&self, at: Instant, epoch: u64) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let ctx: Arc<dyn Context> = me.clone();
        self.env()
            .exec_at(self.lane(), ctx, move || me.trampoline(epoch), at);
    }

    fn trampoline(&self, epoch: u64) {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                Trampoline::Scheduled { epoch: current, .. } if current == epoch => {
                    inner.state = Trampoline::Running;
                }
                _ => return,
            }
        }

        if self.aborted() {
            let dropped = {
                let mut inner = self.inner.lock();
                inner.state = Trampoline::Idle;
                inner.queue.drain()
            };
            log::debug!("thread #{} aborted with {} queued tasks", self.id(), dropped.len());
            return;
        }

        let deadline = Instant::now() + self.env().thread_slice();
        {
            let mut runner = self.runner.lock();
            loop {
                let next = self.inner.lock().queue.pop(Instant::now());
                let Some(queued) = next else {
                    self.run_idle(&mut *runner);
                    break;
                };

                self.run_one(&mut *runner, queued);
                if Instant::now() >= deadline {
                    break;
                }
            }
        }

        let post = {
            let mut inner = self.inner.lock();
            inner.state = Trampoline::Idle;
            inner.schedule_next()
        };
        if let Some((at, epoch)) = post {
            self.post(at, epoch);
        }
    }

    fn run_one(&self, runner: &mut R, queued: Queued<T>) {
        let Queued { ctx, task } = queued;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| runner.run(task))) {
            log::error!(
                "task on thread #{} panicked (context #{} '{}'): {}",
                self.id(),
                ctx.id(),
                ctx.description(),
                panic_message(payload.as_ref())
            );
        }
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    fn run_idle(&self, runner: &mut R) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| runner.idle())) {
            log::error!(
                "idle hook of thread #{} panicked: {}",
                self.id(),
                panic_message(payload.as_ref())
            );
        }
    }

    /// Moves future trampolines to `lane`; one already queued stays where it is.
    pub fn set_lane(&self, lane: Lane) {
        self.lane.store(lane.index() as u8, Ordering::Release);
    }

    /// Number of tasks run so far, panicked ones included.
    pub fn tasks_done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Number of queued tasks, due or not.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl<R, T> Context for Thread<R, T>
where
    R: Runner<T>,
    T: Send + 'static,
{
    fn base(&self) -> &ContextBase {
        &self.base
    }

    /// Drops every queued task at the next trampoline and refuses new ones.
    fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn description(&self) -> String {
        format!("thread on {} lane", self.lane())
    }

    fn lane(&self) -> Lane {
        Lane::from_index(self.lane.load(Ordering::Acquire))
    }
}
