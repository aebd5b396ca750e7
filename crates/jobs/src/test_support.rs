//! Capabilities and helpers shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use connector_core::{Entity, QueryCriteria, QueryResult};

use crate::capability::{QueryCapability, QueryError};

/// Result the test capabilities produce: one entity named after the `term` criterion.
pub fn term_result(criteria: &QueryCriteria) -> QueryResult {
    let term = criteria
        .get("term")
        .and_then(|v| v.as_str())
        .unwrap_or("none");
    QueryResult::new(
        vec![Entity::new(format!("entity-{term}"), "ET1").with_property("term", term)],
        vec![],
    )
}

/// Blocks every query until the test releases it, honouring cancellation.
pub struct GateCapability {
    release: Arc<Semaphore>,
    started: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    start_order: Mutex<Vec<String>>,
}

impl GateCapability {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            release: Arc::new(Semaphore::new(0)),
            started: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            start_order: Mutex::new(Vec::new()),
        })
    }

    /// Let `n` waiting (or future) queries finish.
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// `term` criteria of the queries in the order they started.
    pub fn start_order(&self) -> Vec<String> {
        self.start_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryCapability for GateCapability {
    async fn execute(
        &self,
        criteria: &QueryCriteria,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let term = criteria.get("term").and_then(|v| v.as_str()).unwrap_or("none");
        self.start_order.lock().unwrap().push(term.to_string());
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(QueryError::Cancelled),
            permit = self.release.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
                Ok(term_result(criteria))
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Always fails with an external error.
pub struct FailingCapability;

#[async_trait]
impl QueryCapability for FailingCapability {
    async fn execute(
        &self,
        _criteria: &QueryCriteria,
        _cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        Err(QueryError::External("upstream returned 503".to_string()))
    }
}

/// Panics inside the query.
pub struct PanickingCapability;

#[async_trait]
impl QueryCapability for PanickingCapability {
    async fn execute(
        &self,
        _criteria: &QueryCriteria,
        _cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        panic!("driver crashed")
    }
}

/// Sleeps then answers, ignoring cancellation.
pub struct StubbornCapability(pub Duration);

#[async_trait]
impl QueryCapability for StubbornCapability {
    async fn execute(
        &self,
        criteria: &QueryCriteria,
        _cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        tokio::time::sleep(self.0).await;
        Ok(term_result(criteria))
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn term(term: &str) -> QueryCriteria {
    QueryCriteria::new().with("term", term)
}
