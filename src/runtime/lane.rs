//! The four scheduling lanes and the job queue behind each of them.

use crate::error::panic_message;
use crate::runtime::context::Context;
use crate::runtime::queue::TimedQueue;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// One of the four scheduling queues of an [`Env`](crate::Env).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Single sequential queue tied to the UI loop.
    Main,
    /// Single sequential queue for continuations that need no UI ordering.
    Sub,
    /// Worker pool; tasks run concurrently and unordered.
    Async,
    /// Single dedicated lane for work bound to the graphics context.
    Gl,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Main, Lane::Sub, Lane::Async, Lane::Gl];

    pub(crate) fn index(self) -> usize {
        match self {
            Lane::Main => 0,
            Lane::Sub => 1,
            Lane::Async => 2,
            Lane::Gl => 3,
        }
    }

    pub(crate) fn from_index(index: u8) -> Self {
        match index {
            0 => Lane::Main,
            2 => Lane::Async,
            3 => Lane::Gl,
            _ => Lane::Sub,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lane::Main => "main",
            Lane::Sub => "sub",
            Lane::Async => "async",
            Lane::Gl => "gl",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A task queued on a lane together with the Context it runs for.
pub(crate) struct Job {
    pub(crate) ctx: Arc<dyn Context>,
    pub(crate) task: Box<dyn FnOnce() + Send>,
}

/// Job queue of a single lane, shared by its worker threads.
pub(crate) struct LaneQueue {
    lane: Lane,
    jobs: Mutex<TimedQueue<Job>>,
    ready: Condvar,
    shutdown: AtomicBool,
    panics: AtomicUsize,
}

impl LaneQueue {
    pub(crate) fn new(lane: Lane) -> Self {
        Self {
            lane,
            jobs: Mutex::new(TimedQueue::new()),
            ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            panics: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lane(&self) -> Lane {
        self.lane
    }

    /// Enqueues a job; `None` means "as soon as possible".
    ///
    /// The current time is taken under the queue lock so that jobs pushed one
    /// after another by the same producer keep their order.
    pub(crate) fn push(&self, job: Job, time: Option<Instant>) {
        let rejected = {
            let mut jobs = self.jobs.lock();
            if self.shutdown.load(Ordering::Acquire) {
                Some(job)
            } else {
                jobs.push(time.unwrap_or_else(Instant::now), job);
                self.ready.notify_one();
                None
            }
        };

        // Dropped outside the lock: the job may own promises whose
        // continuations post back onto this lane.
        if let Some(job) = rejected {
            log::trace!(
                "{} lane is shut down, dropping job for context #{}",
                self.lane,
                job.ctx.id()
            );
        }
    }

    /// Worker loop: runs due jobs until the lane shuts down.
    pub(crate) fn run_worker(&self) {
        let mut jobs = self.jobs.lock();

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }

            if let Some(job) = jobs.pop(Instant::now()) {
                drop(jobs);
                self.run(job);
                jobs = self.jobs.lock();
                continue;
            }

            match jobs.next_time() {
                Some(time) => {
                    self.ready.wait_until(&mut jobs, time);
                }
                None => self.ready.wait(&mut jobs),
            }
        }
    }

    /// Runs every job that is due now on the calling thread.
    pub(crate) fn run_ready(&self) -> usize {
        let mut count = 0;

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return count;
            }

            let Some(job) = self.jobs.lock().pop(Instant::now()) else {
                return count;
            };
            self.run(job);
            count += 1;
        }
    }

    fn run(&self, job: Job) {
        let Job { ctx, task } = job;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            self.panics.fetch_add(1, Ordering::Relaxed);
            log::error!(
                "task on {} lane panicked (context #{} '{}'): {}",
                self.lane,
                ctx.id(),
                ctx.description(),
                panic_message(payload.as_ref())
            );
        }
    }

    pub(crate) fn panics(&self) -> usize {
        self.panics.load(Ordering::Relaxed)
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Stops the workers and drops every job still queued.
    pub(crate) fn shutdown(&self) {
        {
            let _jobs = self.jobs.lock();
            self.shutdown.store(true, Ordering::Release);
            self.ready.notify_all();
        }
    }

    pub(crate) fn drain(&self) {
        let leftover = self.jobs.lock().drain();
        if !leftover.is_empty() {
            log::debug!(
                "{} lane dropped {} queued jobs on shutdown",
                self.lane,
                leftover.len()
            );
        }
        drop(leftover);
    }
}
