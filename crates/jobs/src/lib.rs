//! `connector-jobs` — lifecycle of asynchronous acquisition queries.
//!
//! - `job`: the job entity and its state machine
//! - `registry`: concurrency-safe job store
//! - `executor`: bounded background execution of the query capability
//! - `manager`: submit / status / results / delete
//! - `sweeper`: periodic removal of expired finished jobs

pub mod capability;
pub mod config;
pub mod executor;
pub mod job;
pub mod manager;
pub mod registry;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;

pub use capability::{BlockingCapability, QueryCapability, QueryError};
pub use config::JobsConfig;
pub use executor::{ExecutorConfig, ExecutorStats, JobExecutor};
pub use job::{Job, JobFailure, JobOutcome, JobState, JobStateKind, TransitionError};
pub use manager::{DeletedJob, JobError, JobStatusReport, LifecycleManager, ResultsOutcome};
pub use registry::{JobRegistry, JobStats, RegistryError};
pub use sweeper::{SweeperHandle, spawn_sweeper};
