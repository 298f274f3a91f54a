use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration of an [`Env`](crate::Env).
///
/// Deserializable so hosts can keep it next to the rest of their settings;
/// missing fields fall back to [`EnvConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Worker threads backing the Async lane.
    pub async_workers: usize,
    /// Who drains the Main lane.
    pub main_lane: MainLane,
    /// Microseconds a serialized worker keeps running tasks before reposting.
    pub thread_slice_us: u64,
    /// Filesystem root handed to consumers of the Env.
    pub root: PathBuf,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            async_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            main_lane: MainLane::Dedicated,
            thread_slice_us: 1_000,
            root: PathBuf::from("."),
        }
    }
}

/// How the Main lane is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainLane {
    /// The Env runs a worker thread for it.
    Dedicated,
    /// The host's UI loop calls [`EnvHandle::pump_main`](crate::EnvHandle::pump_main).
    Hosted,
}
