//! Time-ordered task heap.
//!
//! Provides a min-heap keyed by `(scheduled time, insertion sequence)` so that
//! tasks come out earliest-first and tasks scheduled for the same instant come
//! out in the order they were pushed.
//!
//! The queue itself is not synchronised; lanes and serialized workers wrap it in
//! their own lock together with the rest of their state.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// A min-heap of tasks ordered by their scheduled time.
///
/// # Example
/// ```
/// use lanework::TimedQueue;
/// use std::time::{Duration, Instant};
///
/// let now = Instant::now();
/// let mut q = TimedQueue::new();
/// q.push(now + Duration::from_millis(10), "later");
/// assert_eq!(q.pop(now), None);
/// assert_eq!(q.pop(now + Duration::from_millis(10)), Some("later"));
/// ```
pub struct TimedQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

struct Entry<T> {
    time: Instant,
    seq: u64,
    task: T,
}

impl<T> TimedQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Inserts `task` to become ready at `time`.
    pub fn push(&mut self, time: Instant, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(Entry { time, seq, task });
    }

    /// Removes and returns the earliest task if it is due at `now`.
    ///
    /// Returns `None` when the queue is empty or the earliest task is scheduled
    /// after `now`.
    pub fn pop(&mut self, now: Instant) -> Option<T> {
        if self.heap.peek()?.time > now {
            return None;
        }
        self.heap.pop().map(|entry| entry.task)
    }

    /// Scheduled time of the earliest task, if any.
    pub fn next_time(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.time)
    }

    /// True when no task is due at `now`.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.next_time().is_none_or(|time| time > now)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Removes every task regardless of its scheduled time, earliest first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut tasks = Vec::with_capacity(self.heap.len());
        while let Some(entry) = self.heap.pop() {
            tasks.push(entry.task);
        }
        tasks
    }
}

impl<T> Default for TimedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// BinaryHeap is a max-heap, so the comparison is reversed to surface the
// earliest (time, seq) pair first.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}
