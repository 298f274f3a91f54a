//! Worker threads that pump the lane queues.
//!
//! Each lane gets its own named threads: one for the sequential lanes (Main,
//! Sub, Gl) and a pool for Async. A worker sleeps on its lane's condition
//! variable until the earliest job is due and exits once the lane shuts down.

use crate::error::{Error, Result};
use crate::runtime::lane::LaneQueue;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Starts `count` worker threads for `queue`.
pub(crate) fn spawn_workers(queue: &Arc<LaneQueue>, count: usize) -> Result<Vec<JoinHandle<()>>> {
    let lane = queue.lane();

    (0..count)
        .map(|index| {
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("lane-{lane}-{index}"))
                .spawn(move || {
                    log::debug!("{lane} lane worker {index} started");
                    queue.run_worker();
                    log::debug!("{lane} lane worker {index} stopped");
                })
                .map_err(|source| Error::Spawn {
                    lane,
                    source: Arc::new(source),
                })
        })
        .collect()
}
