//! Wakers that re-schedule a suspended coroutine onto its lane.
//!
//! Waking never polls inline: it posts the resumption onto the lane of the
//! coroutine's Context, so whichever thread settled the awaited future does not
//! end up running the coroutine body.

use futures::task::ArcWake;

use std::sync::Arc;
use std::task::Waker;

/// Something that can post its own resumption onto a lane.
pub(crate) trait Schedule: Send + Sync + 'static {
    fn schedule(self: &Arc<Self>);
}

struct LaneWaker<S: Schedule> {
    task: Arc<S>,
}

impl<S: Schedule> ArcWake for LaneWaker<S> {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.task.schedule();
    }
}

/// Creates a Waker that re-schedules `task` when woken.
pub(crate) fn make_waker<S: Schedule>(task: Arc<S>) -> Waker {
    futures::task::waker(Arc::new(LaneWaker { task }))
}
