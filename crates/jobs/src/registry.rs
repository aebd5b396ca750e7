//! Job registry: the single mutable store of jobs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use connector_core::JobId;

use super::job::{Job, JobStateKind};

/// Registry error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    DuplicateId(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job counts per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.running + self.completed + self.failed + self.cancelled
    }
}

/// In-memory, concurrency-safe job registry.
///
/// Every operation takes the registry lock for its whole duration, so two
/// operations touching the same id never interleave.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, RegistryError> {
        self.jobs
            .read()
            .map_err(|_| RegistryError::Storage("job registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, RegistryError> {
        self.jobs
            .write()
            .map_err(|_| RegistryError::Storage("job registry lock poisoned".to_string()))
    }

    /// Add a new job.
    pub fn insert(&self, job: Job) -> Result<JobId, RegistryError> {
        let mut jobs = self.write()?;
        let id = job.id();
        if jobs.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        jobs.insert(id, job);
        Ok(id)
    }

    /// Snapshot of a job.
    pub fn get(&self, id: JobId) -> Result<Job, RegistryError> {
        self.read()?
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Apply `f` to the job while holding the registry lock.
    pub fn mutate<R>(&self, id: JobId, f: impl FnOnce(&mut Job) -> R) -> Result<R, RegistryError> {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        Ok(f(job))
    }

    /// Remove a job, returning what was stored.
    pub fn remove(&self, id: JobId) -> Result<Job, RegistryError> {
        self.write()?
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Apply `f` to the job and remove it, under a single lock acquisition.
    pub fn take_with<R>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut Job) -> R,
    ) -> Result<(Job, R), RegistryError> {
        let mut jobs = self.write()?;
        let mut job = jobs.remove(&id).ok_or(RegistryError::NotFound(id))?;
        let out = f(&mut job);
        Ok((job, out))
    }

    /// Drop every finished job whose retention window ended at or before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, RegistryError> {
        let mut jobs = self.write()?;
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(now, ttl));
        Ok(before - jobs.len())
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.read()?.is_empty())
    }

    pub fn stats(&self) -> Result<JobStats, RegistryError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.state().kind() {
                JobStateKind::Running => stats.running += 1,
                JobStateKind::Completed => stats.completed += 1,
                JobStateKind::Failed => stats.failed += 1,
                JobStateKind::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobFailure, JobOutcome};
    use connector_core::{QueryCriteria, QueryResult};

    fn job() -> Job {
        Job::new(QueryCriteria::new().with("term", "alpha"))
    }

    #[test]
    fn insert_then_get_returns_snapshot() {
        let registry = JobRegistry::new();
        let id = registry.insert(job()).unwrap();

        let snapshot = registry.get(id).unwrap();
        assert_eq!(snapshot.id(), id);
        assert_eq!(snapshot.state().kind(), JobStateKind::Running);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let registry = JobRegistry::new();
        let job = job();
        let copy = job.clone();
        registry.insert(job).unwrap();

        assert_eq!(registry.insert(copy.clone()), Err(RegistryError::DuplicateId(copy.id())));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn unknown_id_is_not_found_everywhere() {
        let registry = JobRegistry::new();
        let id = JobId::new();

        assert_eq!(registry.get(id).unwrap_err(), RegistryError::NotFound(id));
        assert_eq!(registry.mutate(id, |_| ()).unwrap_err(), RegistryError::NotFound(id));
        assert_eq!(registry.remove(id).unwrap_err(), RegistryError::NotFound(id));
    }

    #[test]
    fn mutate_applies_transition() {
        let registry = JobRegistry::new();
        let id = registry.insert(job()).unwrap();

        let applied = registry
            .mutate(id, |job| job.finish(JobOutcome::Completed(QueryResult::default()), Utc::now()))
            .unwrap();

        assert_eq!(applied, Ok(JobStateKind::Completed));
        assert_eq!(registry.get(id).unwrap().state().kind(), JobStateKind::Completed);
    }

    #[test]
    fn remove_succeeds_once() {
        let registry = JobRegistry::new();
        let id = registry.insert(job()).unwrap();

        assert_eq!(registry.remove(id).unwrap().id(), id);
        assert_eq!(registry.remove(id).unwrap_err(), RegistryError::NotFound(id));
        assert_eq!(registry.get(id).unwrap_err(), RegistryError::NotFound(id));
    }

    #[test]
    fn take_with_finishes_and_removes_in_one_step() {
        let registry = JobRegistry::new();
        let id = registry.insert(job()).unwrap();

        let (taken, applied) = registry
            .take_with(id, |job| job.finish(JobOutcome::Cancelled, Utc::now()))
            .unwrap();

        assert_eq!(applied, Ok(JobStateKind::Cancelled));
        assert_eq!(taken.state().kind(), JobStateKind::Cancelled);
        assert!(taken.cancel_token().is_cancelled());
        assert!(registry.is_empty().unwrap());
        assert_eq!(
            registry.take_with(id, |_| ()).unwrap_err(),
            RegistryError::NotFound(id)
        );
    }

    #[test]
    fn sweep_removes_only_expired_terminal_jobs() {
        let registry = JobRegistry::new();
        let ttl = Duration::from_secs(30);
        let done = Utc::now();

        let running = registry.insert(job()).unwrap();
        let completed = registry.insert(job()).unwrap();
        let failed = registry.insert(job()).unwrap();
        let fresh = registry.insert(job()).unwrap();

        registry
            .mutate(completed, |j| j.finish(JobOutcome::Completed(QueryResult::default()), done))
            .unwrap()
            .unwrap();
        registry
            .mutate(failed, |j| j.finish(JobOutcome::Failed(JobFailure::execution("x")), done))
            .unwrap()
            .unwrap();
        registry
            .mutate(fresh, |j| {
                j.finish(
                    JobOutcome::Completed(QueryResult::default()),
                    done + chrono::Duration::seconds(20),
                )
            })
            .unwrap()
            .unwrap();

        // Just before the boundary nothing goes.
        let removed = registry
            .sweep_expired(done + chrono::Duration::seconds(29), ttl)
            .unwrap();
        assert_eq!(removed, 0);

        let removed = registry
            .sweep_expired(done + chrono::Duration::seconds(30), ttl)
            .unwrap();
        assert_eq!(removed, 2);

        assert!(registry.get(running).is_ok());
        assert!(registry.get(fresh).is_ok());
        assert_eq!(registry.get(completed).unwrap_err(), RegistryError::NotFound(completed));
        assert_eq!(registry.get(failed).unwrap_err(), RegistryError::NotFound(failed));
    }

    #[test]
    fn stats_count_each_state() {
        let registry = JobRegistry::new();
        let a = registry.insert(job()).unwrap();
        registry.insert(job()).unwrap();
        registry
            .mutate(a, |j| j.finish(JobOutcome::Cancelled, Utc::now()))
            .unwrap()
            .unwrap();

        let stats = registry.stats().unwrap();
        assert_eq!(stats.running, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total(), 2);
    }
}
