//! Background job executor with bounded concurrency and execution timeouts.

use std::future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use connector_core::{JobId, QueryCriteria};

use super::capability::{QueryCapability, QueryError};
use super::job::{Job, JobFailure, JobOutcome, JobStateKind, TransitionError};
use super::registry::{JobRegistry, RegistryError};

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name for logging
    pub name: String,
    /// Maximum concurrently running jobs; later submissions wait in FIFO order
    pub max_concurrent: usize,
    /// Maximum execution time per job, measured from when it starts running
    pub job_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "query-executor".to_string(),
            max_concurrent: 4,
            job_timeout: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// Executor runtime statistics.
///
/// Outcome counters only move when the registry accepts the outcome; results
/// arriving after a job was removed or already finished count as discarded.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_submitted: u64,
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_timed_out: u64,
    pub jobs_cancelled: u64,
    pub jobs_discarded: u64,
    pub queued: usize,
    pub current_running: usize,
}

/// A submitted job waiting for a worker permit.
struct QueuedJob {
    id: JobId,
    query: Arc<QueryCriteria>,
    cancel: CancellationToken,
    done: oneshot::Sender<()>,
}

/// State shared by the dispatcher and the job tasks.
struct Shared {
    capability: Arc<dyn QueryCapability>,
    registry: Arc<JobRegistry>,
    config: ExecutorConfig,
    runtime: Handle,
    stats: Mutex<ExecutorStats>,
}

/// Background job executor.
///
/// Submissions go onto a queue drained by a single dispatcher task, which hands
/// out worker permits strictly in submission order. Each admitted job runs the
/// query capability on its own task and records exactly one terminal outcome
/// in the registry.
#[derive(Clone)]
pub struct JobExecutor {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<QueuedJob>,
}

impl JobExecutor {
    /// Create an executor bound to the current Tokio runtime.
    ///
    /// Panics when called outside a runtime.
    pub fn new(
        capability: Arc<dyn QueryCapability>,
        registry: Arc<JobRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        let permits = config.max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
        let shared = Arc::new(Shared {
            capability,
            registry,
            config,
            runtime: Handle::current(),
            stats: Mutex::new(ExecutorStats::default()),
        });

        let (queue, pending) = mpsc::unbounded_channel();
        shared.runtime.spawn(dispatch(
            shared.clone(),
            Arc::new(Semaphore::new(permits)),
            pending,
        ));

        Self { shared, queue }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.shared.stats()
    }

    /// Queue a job for background execution. Never blocks.
    ///
    /// The returned receiver resolves once the job's outcome has been recorded.
    pub fn submit(&self, job: &Job) -> oneshot::Receiver<()> {
        let id = job.id();
        let (done, finished) = oneshot::channel();

        self.shared.update_stats(|s| {
            s.jobs_submitted += 1;
            s.queued += 1;
        });

        let queued = QueuedJob {
            id,
            query: job.shared_query(),
            cancel: job.cancel_token().clone(),
            done,
        };
        match self.queue.send(queued) {
            Ok(()) => {
                debug!(executor = %self.shared.config.name, job_id = %id, "job queued");
            }
            Err(mpsc::error::SendError(queued)) => {
                self.shared.update_stats(|s| s.queued = s.queued.saturating_sub(1));
                self.shared.record(
                    id,
                    JobOutcome::Failed(JobFailure::execution("executor is shutting down")),
                );
                let _ = queued.done.send(());
            }
        }
        finished
    }
}

/// Admit queued jobs one at a time, in order, as permits free up.
///
/// A job cancelled while waiting is dropped when it reaches the head of the queue.
async fn dispatch(
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
    mut pending: mpsc::UnboundedReceiver<QueuedJob>,
) {
    while let Some(job) = pending.recv().await {
        let permit = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => None,
            permit = permits.clone().acquire_owned() => permit.ok(),
        };
        shared.update_stats(|s| s.queued = s.queued.saturating_sub(1));

        match permit {
            Some(permit) => {
                let shared_for_job = shared.clone();
                shared.runtime.spawn(run(shared_for_job, job, permit));
            }
            None => {
                if job.cancel.is_cancelled() {
                    debug!(executor = %shared.config.name, job_id = %job.id, "job cancelled while queued");
                    shared.record(job.id, JobOutcome::Cancelled);
                } else {
                    shared.record(
                        job.id,
                        JobOutcome::Failed(JobFailure::execution("executor is shutting down")),
                    );
                }
                let _ = job.done.send(());
            }
        }
    }
    debug!(executor = %shared.config.name, "job dispatcher stopped");
}

async fn run(shared: Arc<Shared>, job: QueuedJob, _permit: OwnedSemaphorePermit) {
    let QueuedJob {
        id,
        query,
        cancel,
        done,
    } = job;

    shared.update_stats(|s| s.current_running += 1);
    let started = Instant::now();
    debug!(executor = %shared.config.name, job_id = %id, "job started");

    let outcome = shared.execute(query, &cancel).await;

    shared.update_stats(|s| s.current_running = s.current_running.saturating_sub(1));
    debug!(
        executor = %shared.config.name,
        job_id = %id,
        outcome = %outcome.kind(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "job execution ended"
    );

    shared.record(id, outcome);
    let _ = done.send(());
}

impl Shared {
    fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_stats(&self, f: impl FnOnce(&mut ExecutorStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    async fn execute(&self, query: Arc<QueryCriteria>, cancel: &CancellationToken) -> JobOutcome {
        let capability = self.capability.clone();
        let task_cancel = cancel.clone();
        let mut work = self
            .runtime
            .spawn(async move { capability.execute(&query, task_cancel).await });

        let limit = self.config.job_timeout;
        let deadline = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Late results are discarded; the capability may keep running.
                work.abort();
                JobOutcome::Cancelled
            }
            joined = &mut work => match joined {
                Ok(Ok(result)) => JobOutcome::Completed(result),
                Ok(Err(QueryError::Cancelled)) if cancel.is_cancelled() => JobOutcome::Cancelled,
                Ok(Err(e)) => JobOutcome::Failed(JobFailure::execution(e.to_string())),
                Err(e) => JobOutcome::Failed(JobFailure::execution(format!("query task faulted: {e}"))),
            },
            _ = deadline => {
                cancel.cancel();
                work.abort();
                JobOutcome::Failed(JobFailure::timeout(limit.unwrap_or_default()))
            }
        }
    }

    /// Apply the outcome through the registry; the only writer of executor outcomes.
    fn record(&self, id: JobId, outcome: JobOutcome) {
        let attempted = outcome.kind();
        let failure = match &outcome {
            JobOutcome::Failed(failure) => Some(failure.clone()),
            _ => None,
        };
        let name = &self.config.name;

        let recorded = self.registry.mutate(id, |job| job.finish(outcome, Utc::now()));
        let accepted = matches!(recorded, Ok(Ok(_)));

        self.update_stats(|s| {
            s.jobs_processed += 1;
            match (accepted, attempted, &failure) {
                // A cancel request was honoured, whoever recorded it.
                (_, JobStateKind::Cancelled, _) => s.jobs_cancelled += 1,
                (false, _, _) => s.jobs_discarded += 1,
                (true, _, Some(JobFailure::Timeout { .. })) => s.jobs_timed_out += 1,
                (true, _, Some(_)) => s.jobs_failed += 1,
                (true, _, None) => s.jobs_succeeded += 1,
            }
        });

        match recorded {
            Ok(Ok(state)) => {
                if let Some(failure) = failure {
                    warn!(executor = %name, job_id = %id, error = %failure, "job failed");
                } else {
                    debug!(executor = %name, job_id = %id, state = %state, "job finished");
                }
            }
            Ok(Err(TransitionError::AlreadyTerminal { current, attempted })) => {
                debug!(
                    executor = %name,
                    job_id = %id,
                    current = %current,
                    attempted = %attempted,
                    "job already finished; outcome discarded"
                );
            }
            Err(RegistryError::NotFound(_)) => {
                debug!(
                    executor = %name,
                    job_id = %id,
                    attempted = %attempted,
                    "job removed before it finished; outcome discarded"
                );
            }
            Err(e) => {
                error!(executor = %name, job_id = %id, error = %e, "failed to record job outcome");
            }
        }
    }
}
