//! Core job types and the job state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use connector_core::{JobId, QueryCriteria, QueryResult};

/// Job state without payload, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStateKind {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStateKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStateKind::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStateKind::Running => "running",
            JobStateKind::Completed => "completed",
            JobStateKind::Failed => "failed",
            JobStateKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure detail stored on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    /// The external capability reported an error, or the execution faulted.
    #[error("query execution failed: {message}")]
    ExecutionFailed { message: String },
    /// The job ran past its maximum execution duration.
    #[error("query timed out after {}ms", .limit.as_millis())]
    Timeout { limit: Duration },
}

impl JobFailure {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout { limit }
    }
}

/// Current state of a job. Payloads only exist in the terminal variants that own them.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Submitted, queued or executing
    Running,
    /// Finished with a result
    Completed { result: Arc<QueryResult> },
    /// Finished with an error
    Failed { error: JobFailure },
    /// Withdrawn before it finished
    Cancelled,
}

impl JobState {
    pub fn kind(&self) -> JobStateKind {
        match self {
            JobState::Running => JobStateKind::Running,
            JobState::Completed { .. } => JobStateKind::Completed,
            JobState::Failed { .. } => JobStateKind::Failed,
            JobState::Cancelled => JobStateKind::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

/// Terminal outcome to apply to a running job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(QueryResult),
    Failed(JobFailure),
    Cancelled,
}

impl JobOutcome {
    pub fn kind(&self) -> JobStateKind {
        match self {
            JobOutcome::Completed(_) => JobStateKind::Completed,
            JobOutcome::Failed(_) => JobStateKind::Failed,
            JobOutcome::Cancelled => JobStateKind::Cancelled,
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("job already {current}; cannot move to {attempted}")]
    AlreadyTerminal {
        current: JobStateKind,
        attempted: JobStateKind,
    },
}

/// One tracked asynchronous query.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    state: JobState,
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    query: Arc<QueryCriteria>,
    cancel: CancellationToken,
}

impl Job {
    /// Create a new running job with a fresh identifier.
    pub fn new(query: QueryCriteria) -> Self {
        Self::with_id(JobId::new(), query, Utc::now())
    }

    /// Create a running job with an explicit identity (tests, replays).
    pub fn with_id(id: JobId, query: QueryCriteria, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            state: JobState::Running,
            submitted_at,
            completed_at: None,
            query: Arc::new(query),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn query(&self) -> &QueryCriteria {
        &self.query
    }

    pub(crate) fn shared_query(&self) -> Arc<QueryCriteria> {
        self.query.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Apply a terminal outcome.
    ///
    /// Only a running job can finish; every later attempt is rejected and leaves
    /// the job untouched. Cancelling also fires the job's cancellation token.
    pub fn finish(
        &mut self,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> Result<JobStateKind, TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                current: self.state.kind(),
                attempted: outcome.kind(),
            });
        }

        self.state = match outcome {
            JobOutcome::Completed(result) => JobState::Completed {
                result: Arc::new(result),
            },
            JobOutcome::Failed(error) => JobState::Failed { error },
            JobOutcome::Cancelled => {
                self.cancel.cancel();
                JobState::Cancelled
            }
        };
        self.completed_at = Some(at);
        Ok(self.state.kind())
    }

    /// Whether the retention window of a finished job has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(completed_at) = self.completed_at else {
            return false;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return false;
        };
        completed_at
            .checked_add_signed(ttl)
            .is_some_and(|deadline| deadline <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::Entity;
    use proptest::prelude::*;

    fn alpha_job() -> Job {
        Job::new(QueryCriteria::new().with("term", "alpha"))
    }

    fn sample_result() -> QueryResult {
        QueryResult::new(vec![Entity::new("e1", "ET1").with_property("name", "alpha")], vec![])
    }

    #[test]
    fn new_job_is_running_without_payload() {
        let job = alpha_job();
        assert_eq!(job.state(), &JobState::Running);
        assert!(job.completed_at().is_none());
        assert!(!job.cancel_token().is_cancelled());
        assert_eq!(job.query().get("term"), Some(&serde_json::json!("alpha")));
    }

    #[test]
    fn completion_stores_result_and_timestamp() {
        let mut job = alpha_job();
        let at = Utc::now();

        let kind = job.finish(JobOutcome::Completed(sample_result()), at).unwrap();

        assert_eq!(kind, JobStateKind::Completed);
        assert_eq!(job.completed_at(), Some(at));
        match job.state() {
            JobState::Completed { result } => assert_eq!(**result, sample_result()),
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[test]
    fn second_terminal_transition_is_rejected() {
        let mut job = alpha_job();
        let first = Utc::now();
        job.finish(JobOutcome::Failed(JobFailure::execution("boom")), first)
            .unwrap();

        let err = job
            .finish(JobOutcome::Completed(sample_result()), Utc::now())
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::AlreadyTerminal {
                current: JobStateKind::Failed,
                attempted: JobStateKind::Completed,
            }
        );
        assert_eq!(job.completed_at(), Some(first));
        assert!(matches!(job.state(), JobState::Failed { .. }));
    }

    #[test]
    fn cancelling_fires_the_token() {
        let mut job = alpha_job();
        let token = job.cancel_token().clone();

        job.finish(JobOutcome::Cancelled, Utc::now()).unwrap();

        assert!(token.is_cancelled());
        assert_eq!(job.state().kind(), JobStateKind::Cancelled);
    }

    #[test]
    fn expiry_is_measured_from_completion() {
        let mut job = alpha_job();
        let ttl = Duration::from_secs(60);
        let done = Utc::now();
        assert!(!job.is_expired(done + chrono::Duration::days(1), ttl));

        job.finish(JobOutcome::Completed(QueryResult::default()), done)
            .unwrap();

        assert!(!job.is_expired(done + chrono::Duration::seconds(59), ttl));
        assert!(job.is_expired(done + chrono::Duration::seconds(60), ttl));
    }

    #[test]
    fn timeout_failure_message_names_the_limit() {
        let failure = JobFailure::timeout(Duration::from_millis(250));
        assert_eq!(failure.to_string(), "query timed out after 250ms");
    }

    fn outcome_strategy() -> impl Strategy<Value = u8> {
        0u8..3
    }

    fn outcome_from(tag: u8) -> JobOutcome {
        match tag {
            0 => JobOutcome::Completed(QueryResult::default()),
            1 => JobOutcome::Failed(JobFailure::execution("failed")),
            _ => JobOutcome::Cancelled,
        }
    }

    proptest! {
        /// Property: whatever sequence of outcomes is applied, only the first one
        /// is recorded and the state never leaves it.
        #[test]
        fn only_first_outcome_is_recorded(
            tags in prop::collection::vec(outcome_strategy(), 1..12)
        ) {
            let mut job = alpha_job();
            let expected = outcome_from(tags[0]).kind();

            let accepted = tags
                .iter()
                .filter(|tag| job.finish(outcome_from(**tag), Utc::now()).is_ok())
                .count();

            prop_assert_eq!(accepted, 1);
            prop_assert_eq!(job.state().kind(), expected);
        }
    }
}
