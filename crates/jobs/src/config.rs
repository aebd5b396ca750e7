//! Job subsystem configuration.

use std::time::Duration;

use super::executor::ExecutorConfig;

/// Settings for the lifecycle manager and its background maintenance.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Worker pool and timeout settings
    pub executor: ExecutorConfig,
    /// How long finished jobs are kept before the sweep removes them
    pub result_ttl: Duration,
    /// How often the retention sweep runs
    pub sweep_interval: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            result_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl JobsConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.executor = self.executor.with_max_concurrent(max);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = self.executor.with_job_timeout(timeout);
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
