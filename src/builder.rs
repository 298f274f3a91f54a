//! Fluent builder for Env construction.

use crate::config::{EnvConfig, MainLane};
use crate::error::Result;
use crate::runtime::Env;

use std::path::PathBuf;
use std::time::Duration;

/// Builder for constructing [`Env`] instances with a fluent API.
///
/// # Example
/// ```ignore
/// let env = EnvBuilder::new()
///     .async_workers(4)
///     .hosted_main()
///     .root("/tmp/project")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvBuilder {
    config: EnvConfig,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: EnvConfig) -> Self {
        Self { config }
    }

    /// Sets the number of Async lane workers (at least one is always started).
    pub fn async_workers(mut self, workers: usize) -> Self {
        self.config.async_workers = workers;
        self
    }

    /// Leaves the Main lane to the host, which drains it with `pump_main`.
    pub fn hosted_main(mut self) -> Self {
        self.config.main_lane = MainLane::Hosted;
        self
    }

    /// Time budget a serialized worker runs before yielding its lane.
    pub fn thread_slice(mut self, slice: Duration) -> Self {
        self.config.thread_slice_us = u64::try_from(slice.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Starts the lane workers and returns the running Env.
    pub fn build(self) -> Result<Env> {
        Env::start(self.config)
    }
}
