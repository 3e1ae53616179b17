//! Configuration for the router.

use std::time::Duration;

/// Configuration for the router and its action pipeline.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Bound of the pipeline's request queue; submissions beyond it apply
    /// backpressure to the caller.
    pub pipeline_capacity: usize,
    /// How long a light client may take to re-report its hardware after
    /// being asked to, before it is considered stale.
    pub resync_timeout: Duration,
}

impl RouterConfig {
    /// Sets the pipeline queue bound.
    pub fn with_pipeline_capacity(mut self, capacity: usize) -> Self {
        self.pipeline_capacity = capacity;
        self
    }

    /// Sets the resync staleness timeout.
    pub fn with_resync_timeout(mut self, timeout: Duration) -> Self {
        self.resync_timeout = timeout;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pipeline_capacity: 256,
            resync_timeout: Duration::from_secs(10),
        }
    }
}
