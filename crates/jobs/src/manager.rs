//! Lifecycle manager: the public face of the job subsystem.
//!
//! Orchestrates the registry and the executor behind four operations:
//! acquire, status, results and delete. None of them waits for a job to finish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use connector_core::{JobId, QueryCriteria, QueryResult};

use super::capability::QueryCapability;
use super::config::JobsConfig;
use super::executor::{ExecutorStats, JobExecutor};
use super::job::{Job, JobFailure, JobOutcome, JobState, JobStateKind};
use super::registry::{JobRegistry, JobStats, RegistryError};
use super::sweeper::{SweeperHandle, spawn_sweeper};

/// Caller-facing error of the lifecycle operations.
///
/// Unknown, deleted and expired ids all map to the same `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("query not found: {0}")]
    NotFound(JobId),
    #[error("query id collision: {0}")]
    DuplicateId(JobId),
    #[error("job storage failure: {0}")]
    Storage(String),
}

impl From<RegistryError> for JobError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(id) => JobError::NotFound(id),
            RegistryError::DuplicateId(id) => JobError::DuplicateId(id),
            RegistryError::Storage(msg) => JobError::Storage(msg),
        }
    }
}

/// Point-in-time status of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusReport {
    pub id: JobId,
    pub state: JobStateKind,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<JobFailure>,
}

impl From<&Job> for JobStatusReport {
    fn from(job: &Job) -> Self {
        let error = match job.state() {
            JobState::Failed { error } => Some(error.clone()),
            _ => None,
        };
        Self {
            id: job.id(),
            state: job.state().kind(),
            submitted_at: job.submitted_at(),
            completed_at: job.completed_at(),
            error,
        }
    }
}

/// What `results` has to offer for a known job.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsOutcome {
    /// Still running; ask again later
    Pending,
    /// Finished with a result
    Ready(Arc<QueryResult>),
    /// Finished with a reportable failure
    Failed(JobFailure),
}

/// Confirmation of a deleted job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedJob {
    pub id: JobId,
    /// State at removal; `cancelled` when the job was still running
    pub state: JobStateKind,
    /// Whether the delete withdrew a running job
    pub cancelled: bool,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Submit / status / results / delete over a registry and an executor.
#[derive(Clone)]
pub struct LifecycleManager {
    registry: Arc<JobRegistry>,
    executor: JobExecutor,
    config: JobsConfig,
}

impl LifecycleManager {
    /// Build a manager with its own registry.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(capability: Arc<dyn QueryCapability>, config: JobsConfig) -> Self {
        Self::with_registry(capability, JobRegistry::arc(), config)
    }

    pub fn with_registry(
        capability: Arc<dyn QueryCapability>,
        registry: Arc<JobRegistry>,
        config: JobsConfig,
    ) -> Self {
        let executor = JobExecutor::new(capability, registry.clone(), config.executor.clone());
        Self {
            registry,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Start a query in the background and return its id immediately.
    pub fn acquire(&self, query: QueryCriteria) -> Result<JobId, JobError> {
        let job = Job::new(query);
        let id = self.registry.insert(job.clone()).map_err(|e| {
            error!(job_id = %job.id(), error = %e, "failed to register job");
            JobError::from(e)
        })?;

        self.executor.submit(&job);
        info!(job_id = %id, criteria = job.query().len(), "query accepted");
        Ok(id)
    }

    /// Current state and timestamps of a job.
    pub fn status(&self, id: JobId) -> Result<JobStatusReport, JobError> {
        let job = self.registry.get(id)?;
        Ok(JobStatusReport::from(&job))
    }

    /// The job's result, a pending marker, or its failure.
    ///
    /// A cancelled job was withdrawn by its caller and reads as not found.
    pub fn results(&self, id: JobId) -> Result<ResultsOutcome, JobError> {
        let job = self.registry.get(id)?;
        match job.state() {
            JobState::Running => Ok(ResultsOutcome::Pending),
            JobState::Completed { result } => Ok(ResultsOutcome::Ready(result.clone())),
            JobState::Failed { error } => Ok(ResultsOutcome::Failed(error.clone())),
            JobState::Cancelled => Err(JobError::NotFound(id)),
        }
    }

    /// Remove a job, cancelling it first when it is still running.
    pub fn delete(&self, id: JobId) -> Result<DeletedJob, JobError> {
        let (removed, cancelled) = self.registry.take_with(id, |job| {
            !job.state().is_terminal() && job.finish(JobOutcome::Cancelled, Utc::now()).is_ok()
        })?;

        if cancelled {
            info!(job_id = %id, "running query cancelled and removed");
        } else {
            debug!(job_id = %id, state = %removed.state().kind(), "query removed");
        }

        Ok(DeletedJob {
            id,
            state: removed.state().kind(),
            cancelled,
            submitted_at: removed.submitted_at(),
            completed_at: removed.completed_at(),
        })
    }

    /// Remove finished jobs whose retention window ended at or before now.
    pub fn sweep_expired(&self) -> Result<usize, JobError> {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize, JobError> {
        Ok(self.registry.sweep_expired(now, self.config.result_ttl)?)
    }

    /// Start the periodic retention sweep configured for this manager.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        spawn_sweeper(
            self.registry.clone(),
            self.config.result_ttl,
            self.config.sweep_interval,
        )
    }

    pub fn stats(&self) -> Result<JobStats, JobError> {
        Ok(self.registry.stats()?)
    }

    pub fn executor_stats(&self) -> ExecutorStats {
        self.executor.stats()
    }
}
